// src/core/shutdown.rs

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const DRAINED: u8 = 2;

// Granularität der interruptierbaren Waits
const POLL_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopping,
    Drained,
}

/// Process-wide run state: running → stopping → drained, never reversed.
/// Cancellation is cooperative; the flag is polled, never preempted.
#[derive(Debug, Default)]
pub struct ShutdownState {
    state: AtomicU8,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
        }
    }

    pub fn state(&self) -> RunState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => RunState::Running,
            STOPPING => RunState::Stopping,
            _ => RunState::Drained,
        }
    }

    /// Idempotent; a second signal changes nothing.
    pub fn request_stop(&self) {
        self.state.fetch_max(STOPPING, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.state.load(Ordering::SeqCst) >= STOPPING
    }

    /// Only valid once stopping; a drain cannot precede the stop signal.
    pub fn mark_drained(&self) {
        let _ = self
            .state
            .compare_exchange(STOPPING, DRAINED, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Sleep up to `timeout`, abandoned as soon as the stop signal fires.
    /// Returns true if the stop signal was observed.
    pub fn wait_stop(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_stopping() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(POLL_SLICE));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_monotonic() {
        let state = ShutdownState::new();
        assert_eq!(state.state(), RunState::Running);
        assert!(!state.is_stopping());

        state.request_stop();
        assert_eq!(state.state(), RunState::Stopping);
        assert!(state.is_stopping());

        // idempotent
        state.request_stop();
        assert_eq!(state.state(), RunState::Stopping);

        state.mark_drained();
        assert_eq!(state.state(), RunState::Drained);
        assert!(state.is_stopping());
    }

    #[test]
    fn drain_without_stop_is_a_no_op() {
        let state = ShutdownState::new();
        state.mark_drained();
        assert_eq!(state.state(), RunState::Running);
    }

    #[test]
    fn wait_stop_times_out_while_running() {
        let state = ShutdownState::new();
        let started = Instant::now();
        assert!(!state.wait_stop(Duration::from_millis(60)));
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn wait_stop_returns_early_once_stopped() {
        let state = ShutdownState::new();
        state.request_stop();
        let started = Instant::now();
        assert!(state.wait_stop(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
