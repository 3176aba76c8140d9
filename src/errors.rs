// src/errors.rs

//! Crate-wide error type.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecmdError {
    #[error("Invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Cannot walk watch root {path:?}: {source}")]
    WatchRoot {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Cannot stat {path:?}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Filesystem event stream closed")]
    EventStreamClosed,

    #[error("Failed to spawn {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed: {0}")]
    CommandFailed(ExitStatus),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, RecmdError>;
