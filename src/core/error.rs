// src/core/error.rs

use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    /// Network or HTTP failure while polling; fatal to that poller's loop.
    /// A non-2xx status counts as transport failure of the same severity.
    #[error("transport error requesting {url}: {cause}")]
    Transport {
        url: String,
        #[source]
        cause: Box<dyn StdError + Send + Sync>,
    },
    /// Malformed record; the offending item is logged and dropped.
    #[error("failed to serialize record: {cause}")]
    Serialization {
        #[source]
        cause: serde_json::Error,
    },
    /// Archival failure for one file; the original stays on disk.
    #[error("failed to archive {path:?}: {cause}")]
    Compression {
        path: PathBuf,
        #[source]
        cause: Box<dyn StdError + Send + Sync>,
    },
    /// A component did not exit within the shutdown grace period.
    #[error("component '{component}' did not stop within the shutdown grace period")]
    ShutdownTimeout { component: String },
}

impl RecorderError {
    pub fn transport(
        url: impl Into<String>,
        cause: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            url: url.into(),
            cause: cause.into(),
        }
    }

    pub fn compression(path: &Path, cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Compression {
            path: path.to_path_buf(),
            cause: cause.into(),
        }
    }
}
