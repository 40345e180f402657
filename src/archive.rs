// src/archive.rs

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::RecorderContext;
use crate::core::error::RecorderError;
use crate::core::timestamp::archive_path;

const WORKERS: usize = 2;
const BATCH_BACKOFF: Duration = Duration::from_secs(1);
const DRAIN_POLL: Duration = Duration::from_millis(200);
const COMPRESSION_LEVEL: i64 = 4;

/// Compress one record file into `<stem>_json.zip` and remove the original.
/// The original is deleted only after the archive is completely written; on
/// failure the partial archive is dropped and the original stays on disk.
pub fn zip_record_file(path: &Path) -> Result<PathBuf, RecorderError> {
    let target = archive_path(path);
    debug!("[archive] zipping file {:?}...", path);

    let entry_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("record.json")
        .to_string();

    if let Err(cause) = write_archive(path, &target, &entry_name) {
        let _ = fs::remove_file(&target);
        return Err(RecorderError::compression(path, cause));
    }

    debug!("[archive] removing original file {:?}...", path);
    fs::remove_file(path).map_err(|e| RecorderError::compression(path, e))?;
    Ok(target)
}

fn write_archive(path: &Path, target: &Path, entry_name: &str) -> anyhow::Result<()> {
    let file = File::create(target)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));
    zip.start_file(entry_name, options)?;
    let mut source = File::open(path)?;
    io::copy(&mut source, &mut zip)?;
    zip.finish()?;
    Ok(())
}

/// Shared compression coordinator. Normal mode batches the deduplicated
/// pending set onto a small worker pool; once the stop signal fires it waits
/// for both writers' final files and drains the rest synchronously.
pub fn run_archiver(ctx: Arc<RecorderContext>) -> Result<()> {
    while !ctx.shutdown.is_stopping() {
        let paths = ctx.drain_pending_archives();
        if paths.is_empty() {
            ctx.shutdown.wait_stop(BATCH_BACKOFF);
            continue;
        }

        debug!("[archive] zipping files in parallel: {:?}", paths);
        compress_batch(&paths);
        info!("[archive] batch of {} file(s) processed", paths.len());
    }

    info!("[archive] zipping last files...");
    while !ctx.all_final_files_emitted() {
        debug!("[archive] waiting for final files to be ready for zipping...");
        thread::sleep(DRAIN_POLL);
    }

    // ab hier nicht mehr unterbrechbar; every remaining path gets processed
    for path in ctx.drain_pending_archives() {
        if let Err(e) = zip_record_file(&path) {
            error!("[archive] {}", e);
        }
    }

    info!("[archive] stopped");
    Ok(())
}

/// Fixed pool of two workers pulling off one shared feed; a failed file is
/// logged and left on disk without holding up its siblings.
fn compress_batch(paths: &HashSet<PathBuf>) {
    let (tx, rx) = crossbeam_channel::unbounded::<PathBuf>();
    for path in paths {
        let _ = tx.send(path.clone());
    }
    drop(tx);

    thread::scope(|scope| {
        for _ in 0..WORKERS {
            let rx = rx.clone();
            scope.spawn(move || {
                for path in rx.iter() {
                    if let Err(e) = zip_record_file(&path) {
                        error!("[archive] {}", e);
                    }
                }
            });
        }
    });
}
