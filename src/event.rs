// src/event.rs

use std::path::PathBuf;
use std::time::Instant;

/// A qualifying filesystem change, as seen by the directory watcher.
///
/// `observed_at` is stamped when the watcher detects the change, not when the
/// supervisor receives it; debouncing compares these timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub observed_at: Instant,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, observed_at: Instant) -> Self {
        Self {
            path: path.into(),
            observed_at,
        }
    }

    /// Event for `path` stamped with the current time.
    pub fn now(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Instant::now())
    }
}
