// src/logging.rs

//! Logging setup for `recmd` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `--verbose` (debug)
//! 3. `RECMD_LOG` environment variable (e.g. "info", "debug")
//! 4. default to `info`
//!
//! Logs are sent to STDERR; STDOUT carries the watched command's output.

use anyhow::{Result, anyhow};
use tracing_subscriber::fmt;

use crate::cli::{CliArgs, LogLevel};

/// Environment variable consulted when no level is given on the CLI.
pub const LOG_ENV: &str = "RECMD_LOG";

/// Explicit logging configuration, resolved from the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub verbose: bool,
    pub level: Option<LogLevel>,
}

impl LogSettings {
    pub fn from_args(args: &CliArgs) -> Self {
        Self {
            verbose: args.verbose,
            level: args.log_level,
        }
    }

    /// Effective level, given the value of `RECMD_LOG` (if set).
    pub fn resolve(&self, env_value: Option<&str>) -> tracing::Level {
        if let Some(lvl) = self.level {
            return level_from_log_level(lvl);
        }
        if self.verbose {
            return tracing::Level::DEBUG;
        }
        env_value
            .and_then(parse_level_str)
            .unwrap_or(tracing::Level::INFO)
    }
}

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(settings: LogSettings) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    let level = settings.resolve(env_value.as_deref());

    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("initialising logging: {e}"))?;

    if settings.verbose {
        tracing::debug!("verbose mode enabled");
    }
    Ok(())
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
