// src/core/mod.rs

pub mod error;
pub mod shutdown;
pub mod timestamp;

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde_json::{Map, Value};

use crate::core::shutdown::ShutdownState;

/// The two datasets being recorded. Closed set, one queue each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Flow,
    Graph,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Flow, Source::Graph];

    /// Wire name, also used in file names and record keys.
    pub fn name(self) -> &'static str {
        match self {
            Source::Flow => "flowinfo",
            Source::Graph => "graphinfo",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One successful poll. Immutable; ownership moves poller → queue → writer.
#[derive(Debug, Clone)]
pub struct SampleItem {
    /// Wall-clock capture time in milliseconds, not server time.
    pub timestamp_ms: i64,
    pub payload: Value,
}

impl SampleItem {
    pub fn new(timestamp_ms: i64, payload: Value) -> Self {
        Self {
            timestamp_ms,
            payload,
        }
    }

    /// One JSON object per file line: the timestamp key first, then the
    /// payload fields. A non-object payload lands under a "payload" key.
    pub fn to_record(&self) -> Value {
        let mut record = Map::new();
        record.insert("timestamp".to_string(), Value::from(self.timestamp_ms));
        match &self.payload {
            Value::Object(fields) => {
                for (key, value) in fields {
                    record.insert(key.clone(), value.clone());
                }
            }
            other => {
                record.insert("payload".to_string(), other.clone());
            }
        }
        Value::Object(record)
    }
}

/// Unbounded sample queue plus the write-once final-file flag of one source.
struct SourceChannel {
    tx: Sender<SampleItem>,
    rx: Receiver<SampleItem>,
    final_file: AtomicBool,
}

impl SourceChannel {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            final_file: AtomicBool::new(false),
        }
    }
}

/// Shared state handed to every task at construction: the stop signal, one
/// eagerly created channel per source and the pending-archive feed.
pub struct RecorderContext {
    pub shutdown: ShutdownState,
    flow: SourceChannel,
    graph: SourceChannel,
    zip_tx: Sender<PathBuf>,
    zip_rx: Receiver<PathBuf>,
}

impl RecorderContext {
    pub fn new() -> Self {
        let (zip_tx, zip_rx) = unbounded();
        Self {
            shutdown: ShutdownState::new(),
            flow: SourceChannel::new(),
            graph: SourceChannel::new(),
            zip_tx,
            zip_rx,
        }
    }

    fn channel(&self, source: Source) -> &SourceChannel {
        match source {
            Source::Flow => &self.flow,
            Source::Graph => &self.graph,
        }
    }

    pub fn sample_sender(&self, source: Source) -> Sender<SampleItem> {
        self.channel(source).tx.clone()
    }

    pub fn sample_receiver(&self, source: Source) -> &Receiver<SampleItem> {
        &self.channel(source).rx
    }

    /// Queue a completed file for compression. Receiver lives in this
    /// context, so the send cannot fail.
    pub fn submit_archive(&self, path: PathBuf) {
        let _ = self.zip_tx.send(path);
    }

    /// Collect everything currently queued for compression, deduplicated.
    pub fn drain_pending_archives(&self) -> HashSet<PathBuf> {
        let mut paths = HashSet::new();
        while let Ok(path) = self.zip_rx.try_recv() {
            paths.insert(path);
        }
        paths
    }

    /// Raised by each writer exactly once, as its terminal action.
    pub fn mark_final_file(&self, source: Source) {
        self.channel(source).final_file.store(true, Ordering::SeqCst);
    }

    pub fn final_file_emitted(&self, source: Source) -> bool {
        self.channel(source).final_file.load(Ordering::SeqCst)
    }

    pub fn all_final_files_emitted(&self) -> bool {
        Source::ALL.iter().all(|s| self.final_file_emitted(*s))
    }
}

impl Default for RecorderContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_names() {
        assert_eq!(Source::Flow.name(), "flowinfo");
        assert_eq!(Source::Graph.name(), "graphinfo");
        assert_eq!(format!("{}", Source::Graph), "graphinfo");
    }

    #[test]
    fn record_flattens_object_payload() {
        let item = SampleItem::new(1700000000123, json!({"nodes": [1, 2], "links": []}));
        let record = item.to_record();

        let fields = record.as_object().unwrap();
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["timestamp", "nodes", "links"]);
        assert_eq!(fields["timestamp"], json!(1700000000123i64));
        assert_eq!(fields["nodes"], json!([1, 2]));
    }

    #[test]
    fn record_nests_non_object_payload() {
        let item = SampleItem::new(42, json!([1, 2, 3]));
        let record = item.to_record();
        assert_eq!(record["timestamp"], json!(42));
        assert_eq!(record["payload"], json!([1, 2, 3]));
    }

    #[test]
    fn queues_exist_eagerly_per_source() {
        let ctx = RecorderContext::new();
        for source in Source::ALL {
            let tx = ctx.sample_sender(source);
            tx.send(SampleItem::new(1, json!({}))).unwrap();
            assert_eq!(ctx.sample_receiver(source).len(), 1);
        }
        // die Queues sind getrennt
        assert_eq!(ctx.sample_receiver(Source::Flow).len(), 1);
    }

    #[test]
    fn pending_archives_deduplicate() {
        let ctx = RecorderContext::new();
        ctx.submit_archive(PathBuf::from("/tmp/a.json"));
        ctx.submit_archive(PathBuf::from("/tmp/a.json"));
        ctx.submit_archive(PathBuf::from("/tmp/b.json"));

        let paths = ctx.drain_pending_archives();
        assert_eq!(paths.len(), 2);
        assert!(ctx.drain_pending_archives().is_empty());
    }

    #[test]
    fn final_file_flags_are_independent() {
        let ctx = RecorderContext::new();
        assert!(!ctx.all_final_files_emitted());

        ctx.mark_final_file(Source::Flow);
        assert!(ctx.final_file_emitted(Source::Flow));
        assert!(!ctx.final_file_emitted(Source::Graph));
        assert!(!ctx.all_final_files_emitted());

        ctx.mark_final_file(Source::Graph);
        assert!(ctx.all_final_files_emitted());
    }
}
