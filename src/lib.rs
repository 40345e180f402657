// src/lib.rs
pub mod archive;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod poller;
pub mod writer;

// Re-export die wichtigsten Typen
pub use crate::config::Config;
pub use crate::core::shutdown::{RunState, ShutdownState};
pub use crate::core::{RecorderContext, SampleItem, Source};
