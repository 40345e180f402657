// src/pipeline.rs

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, error};

use crate::core::error::RecorderError;

const JOIN_POLL: Duration = Duration::from_millis(50);

/// Owns every spawned task so shutdown can join them all in one place,
/// bounded by a grace period instead of hanging forever on a stuck one.
pub struct Pipeline {
    handles: Vec<(String, JoinHandle<()>)>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Spawn a named task; a task error is logged once, when it happens.
    pub fn spawn<F>(&mut self, name: &str, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let task_name = name.to_string();
        let handle = thread::spawn(move || {
            if let Err(e) = task() {
                error!("[{}] fatal: {:#}", task_name, e);
            }
        });
        self.handles.push((name.to_string(), handle));
    }

    /// Block until every task has exited. A task still running once `grace`
    /// has elapsed surfaces a shutdown timeout to the operator.
    pub fn join_all(self, grace: Duration) -> Result<()> {
        let deadline = Instant::now() + grace;

        for (name, handle) in self.handles {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    return Err(RecorderError::ShutdownTimeout { component: name }.into());
                }
                thread::sleep(JOIN_POLL);
            }
            if handle.join().is_err() {
                error!("[pipeline] task '{}' panicked", name);
            } else {
                debug!("[pipeline] task '{}' finished", name);
            }
        }

        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
