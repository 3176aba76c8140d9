// src/config/mod.rs

//! Run configuration.
//!
//! `recmd` takes all of its configuration from the command line. The parsed
//! arguments are collected into a [`RawWatchConfig`] and validated into a
//! [`WatchConfig`], which is what the rest of the crate consumes.

pub mod validate;

use crate::cli::WatchArgs;
use crate::errors::Result;
use crate::logging::LogSettings;
use crate::watch::WatchSpec;

/// Unvalidated configuration, straight from the CLI.
#[derive(Debug, Clone)]
pub struct RawWatchConfig {
    pub path: String,
    pub excludes: Vec<String>,
    pub command: Vec<String>,
    pub log: LogSettings,
}

/// Validated configuration for a `recmd watch` invocation.
///
/// Construct it with `WatchConfig::try_from(raw)` or
/// [`WatchConfig::from_args`].
#[derive(Debug, Clone)]
pub struct WatchConfig {
    spec: WatchSpec,
    command: Vec<String>,
    log: LogSettings,
}

impl WatchConfig {
    pub fn from_args(args: &WatchArgs, log: LogSettings) -> Result<Self> {
        Self::try_from(RawWatchConfig {
            path: args.path.clone(),
            excludes: args.exclude.clone(),
            command: args.command.clone(),
            log,
        })
    }

    pub(crate) fn new_unchecked(spec: WatchSpec, command: Vec<String>, log: LogSettings) -> Self {
        Self { spec, command, log }
    }

    /// Include pattern and exclusions (default exclusions included).
    pub fn spec(&self) -> &WatchSpec {
        &self.spec
    }

    /// Program and arguments of the watched command.
    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn log(&self) -> LogSettings {
        self.log
    }
}
