// src/config/validate.rs

use crate::config::{RawWatchConfig, WatchConfig};
use crate::errors::{RecmdError, Result};
use crate::watch::WatchSpec;

impl TryFrom<RawWatchConfig> for WatchConfig {
    type Error = RecmdError;

    fn try_from(raw: RawWatchConfig) -> std::result::Result<Self, Self::Error> {
        validate_command(&raw.command)?;

        let spec = WatchSpec::new(raw.path, raw.excludes);
        validate_patterns(&spec)?;

        Ok(WatchConfig::new_unchecked(spec, raw.command, raw.log))
    }
}

fn validate_command(command: &[String]) -> Result<()> {
    match command.first() {
        None => Err(RecmdError::ConfigError(
            "a command to run is required".to_string(),
        )),
        Some(program) if program.trim().is_empty() => Err(RecmdError::ConfigError(
            "the command name must not be empty".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

fn validate_patterns(spec: &WatchSpec) -> Result<()> {
    if spec.include.trim().is_empty() {
        return Err(RecmdError::ConfigError(
            "the watch path must not be empty".to_string(),
        ));
    }
    if let Some(blank) = spec.excludes.iter().find(|e| e.trim().is_empty()) {
        return Err(RecmdError::ConfigError(format!(
            "exclude patterns must not be empty (got {blank:?})"
        )));
    }
    // Compiling here surfaces bad patterns before anything is spawned.
    spec.compile()?;
    Ok(())
}
