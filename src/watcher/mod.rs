//! Capture watcher (producer node)
//!
//! Watches one directory for new preview captures, derives the scheduled
//! end-time from their headers, and publishes a Survey Record to the bus.

mod capture_watcher;
mod config;

pub use capture_watcher::{CaptureWatcher, WatcherError, survey_from_header};
pub use config::WatcherConfig;
