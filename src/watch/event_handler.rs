// src/watch/event_handler.rs

//! Classification of raw `notify` events.

use std::io;
use std::path::Path;

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

use crate::errors::{RecmdError, Result};

/// What a notification path turned out to be once inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    /// The path was removed or renamed away; it was not inspected.
    Removed,
    Directory,
    File,
    /// The path disappeared between the notification and the stat, which is
    /// normal for editor swap files and other temporaries.
    Vanished,
}

/// Access notifications (open, read, close) never count as a change.
pub fn is_relevant(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

/// Does the `index`-th path of an event with this kind no longer exist under
/// that name? True for removals and for the source side of a rename.
pub fn is_departure(kind: &EventKind, index: usize) -> bool {
    match kind {
        EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => true,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => index == 0,
        _ => false,
    }
}

/// Stat the `index`-th notification path unless it departed.
///
/// Only a vanished path is tolerated; any other stat failure is returned.
pub async fn inspect(kind: &EventKind, index: usize, path: &Path) -> Result<PathState> {
    if is_departure(kind, index) {
        return Ok(PathState::Removed);
    }

    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(PathState::Directory),
        Ok(_) => Ok(PathState::File),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(PathState::Vanished),
        Err(source) => Err(RecmdError::Stat {
            path: path.to_path_buf(),
            source,
        }),
    }
}
