// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod event;
pub mod exec;
pub mod logging;
pub mod watch;

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cli::{CliArgs, Command};
use crate::config::WatchConfig;
use crate::errors::{RecmdError, Result};
use crate::event::ChangeEvent;
use crate::exec::Supervisor;
use crate::logging::LogSettings;
use crate::watch::DirectoryWatcher;

/// Capacity of the watcher -> supervisor channel. A full channel blocks the
/// watcher until the supervisor catches up.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit the binary was built from, injected via `RECMD_GIT_COMMIT`.
pub const GIT_COMMIT: &str = match option_env!("RECMD_GIT_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

/// High-level entry point used by `main.rs`.
///
/// Logging is initialised from the validated watch configuration; `version`
/// prints and returns without it.
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    match &args.command {
        Command::Version(version) => {
            println!("{}", version_string(version.short));
            Ok(())
        }
        Command::Watch(watch_args) => {
            let config = WatchConfig::from_args(watch_args, LogSettings::from_args(&args))?;
            logging::init_logging(config.log())?;
            watch(&config).await?;
            Ok(())
        }
    }
}

/// `0.1.0` when `short`, `Version 0.1.0 (git-<commit>)` otherwise.
pub fn version_string(short: bool) -> String {
    if short {
        VERSION.to_string()
    } else {
        format!("Version {VERSION} (git-{GIT_COMMIT})")
    }
}

/// Watch the current directory and supervise the command until Ctrl-C or a
/// fatal error.
pub async fn watch(config: &WatchConfig) -> Result<()> {
    let base = std::env::current_dir()?;
    let cancel = CancellationToken::new();

    let relay = tokio::spawn(relay_interrupts(cancel.clone()));
    let result = watch_in(config, base, cancel).await;
    relay.abort();

    result
}

/// Run the watcher and the supervisor side by side under `cancel`.
///
/// - Directory subscriptions are set up before the command is first started,
///   so a bad watch root fails fast.
/// - Whichever task finishes first cancels the other.
/// - The first error observed is returned.
pub async fn watch_in(config: &WatchConfig, base: PathBuf, cancel: CancellationToken) -> Result<()> {
    debug!(
        path = %config.spec().include,
        exclude = ?config.spec().excludes,
        command = ?config.command(),
        "watch options"
    );

    let session = DirectoryWatcher::new(config.spec(), base)?.subscribe()?;
    let (tx, rx) = mpsc::channel::<ChangeEvent>(EVENT_CHANNEL_CAPACITY);
    let supervisor = Supervisor::new(config.command().to_vec(), rx);

    let mut tasks = JoinSet::new();
    {
        let cancel = cancel.clone();
        tasks.spawn(
            async move {
                let result = session.run(tx, cancel.clone()).await;
                cancel.cancel();
                result
            }
            .instrument(info_span!("watcher")),
        );
    }
    {
        let cancel = cancel.clone();
        tasks.spawn(
            async move {
                let result = supervisor.run(cancel.clone()).await;
                cancel.cancel();
                result
            }
            .instrument(info_span!("supervisor")),
        );
    }

    let mut first_err: Option<RecmdError> = None;
    while let Some(joined) = tasks.join_next().await {
        cancel.cancel();
        let result = joined.map_err(RecmdError::from).and_then(|r| r);
        if let Err(err) = result {
            match first_err {
                None => first_err = Some(err),
                Some(_) => debug!(error = %err, "further error during shutdown"),
            }
        }
    }

    match first_err {
        Some(err) => Err(err),
        None => {
            info!("shut down cleanly");
            Ok(())
        }
    }
}

async fn relay_interrupts(cancel: CancellationToken) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("interrupt received; shutting down");
        cancel.cancel();
    }
}
