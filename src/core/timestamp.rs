// src/core/timestamp.rs

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};

use crate::core::Source;

/// Wall-clock capture time in milliseconds since the epoch.
pub fn utc_ms_now() -> i64 {
    Utc::now().timestamp_millis()
}

/// `<captureStart>_<source>.json`, second resolution.
pub fn record_file_name(start: DateTime<Local>, source: Source) -> String {
    format!("{}_{}.json", start.format("%Y_%m_%d_%H-%M-%S"), source.name())
}

/// Archive target next to the original: `x.json` → `x_json.zip`.
pub fn archive_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = name.strip_suffix(".json").unwrap_or(name);
    path.with_file_name(format!("{}_json.zip", stem))
}
