// src/writer.rs

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use crossbeam_channel::RecvTimeoutError;
use log::{debug, error, info};

use crate::core::error::RecorderError;
use crate::core::timestamp::record_file_name;
use crate::core::{RecorderContext, SampleItem, Source};

const QUEUE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub output_dir: PathBuf,
    pub storage_interval: Duration,
}

/// Rotating writer loop for one source: drain the queue into the open file,
/// rotate on the storage boundary, submit closed files for compression.
///
/// The final-file flag is raised as the terminal action on every exit path;
/// the compression coordinator's shutdown drain blocks on it.
pub fn run_writer(ctx: Arc<RecorderContext>, source: Source, cfg: WriterConfig) -> Result<()> {
    let result = writer_loop(&ctx, source, &cfg);
    ctx.mark_final_file(source);
    info!("[writer] {}: stopped", source);
    result
}

fn writer_loop(ctx: &RecorderContext, source: Source, cfg: &WriterConfig) -> Result<()> {
    fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("creating output dir {:?}", cfg.output_dir))?;
    let rx = ctx.sample_receiver(source);

    // bleibt über die Stop-Flanke hinweg offen, damit der letzte Drain
    // noch in dieser Datei landet
    let mut open_file: Option<(PathBuf, BufWriter<File>)> = None;

    while !ctx.shutdown.is_stopping() {
        let path = cfg.output_dir.join(record_file_name(Local::now(), source));
        info!("[writer] {}: storing to {:?}", source, path);
        let file = File::create(&path).with_context(|| format!("creating {:?}", path))?;
        open_file = Some((path, BufWriter::new(file)));
        let started = Instant::now();

        while started.elapsed() < cfg.storage_interval && !ctx.shutdown.is_stopping() {
            match rx.recv_timeout(QUEUE_POLL) {
                Ok(item) => {
                    if let Some((_, file)) = open_file.as_mut() {
                        append_record(source, file, &item);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // poller weg; rotation stays on schedule
                    std::thread::sleep(QUEUE_POLL);
                }
            }
        }

        if ctx.shutdown.is_stopping() {
            break;
        }

        if let Some((path, file)) = open_file.take() {
            close_and_submit(ctx, source, path, file)?;
        }
    }

    // one last drain into the still-open file, submitted even at zero items
    if let Some((path, mut file)) = open_file.take() {
        while let Ok(item) = rx.try_recv() {
            append_record(source, &mut file, &item);
        }
        close_and_submit(ctx, source, path, file)?;
    }

    Ok(())
}

fn append_record(source: Source, file: &mut BufWriter<File>, item: &SampleItem) {
    debug!(
        "[writer] {}: writing item with timestamp {}",
        source, item.timestamp_ms
    );
    let line = match serde_json::to_vec(&item.to_record()) {
        Ok(line) => line,
        Err(cause) => {
            let e = RecorderError::Serialization { cause };
            error!("[writer] {}: dropping item: {}", source, e);
            return;
        }
    };
    if let Err(e) = file.write_all(&line).and_then(|()| file.write_all(b"\n")) {
        error!("[writer] {}: write failed: {}", source, e);
    }
}

fn close_and_submit(
    ctx: &RecorderContext,
    source: Source,
    path: PathBuf,
    mut file: BufWriter<File>,
) -> Result<()> {
    file.flush().with_context(|| format!("flushing {:?}", path))?;
    drop(file);
    info!("[writer] {}: submitting {:?} for compression", source, path);
    ctx.submit_archive(path);
    Ok(())
}
