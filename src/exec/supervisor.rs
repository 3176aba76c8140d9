// src/exec/supervisor.rs

//! The restart state machine.
//!
//! ```text
//! Idle --start--> Running --change--> (Cancelling --> Running)* --cancel--> Terminated
//! ```
//!
//! A single control loop owns the current [`RunHandle`] and waits on three
//! sources at once: change events, the current run's termination report, and
//! the shared cancellation token.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::event::ChangeEvent;
use crate::exec::runner::{RunHandle, Termination};

/// Changes observed within this window of the last restart are coalesced
/// into it.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Restarts the command on qualifying changes, keeping at most one run alive.
#[derive(Debug)]
pub struct Supervisor {
    command: Vec<String>,
    events: mpsc::Receiver<ChangeEvent>,
}

/// Where the control loop stands between two wake-ups.
struct State {
    current: Option<RunHandle>,
    last_restart: Instant,
    next_id: u64,
}

impl Supervisor {
    pub fn new(command: Vec<String>, events: mpsc::Receiver<ChangeEvent>) -> Self {
        Self { command, events }
    }

    /// Start the command, then restart it on every change event that falls
    /// outside the debounce window.
    ///
    /// Returns `Ok(())` when `cancel` fires or the event channel closes, and
    /// the failure when the current run ends in a way that is not ignorable.
    /// Either way the current run is stopped before returning.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut state = State {
            current: None,
            last_restart: Instant::now(),
            next_id: 1,
        };
        self.start(&mut state, &cancel)?;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("supervisor cancelled");
                    break Ok(());
                }
                termination = next_termination(&mut state.current) => {
                    if let Err(err) = self.on_termination(termination) {
                        break Err(err);
                    }
                }
                event = self.events.recv() => match event {
                    Some(event) => {
                        if let Err(err) = self.on_change(event, &mut state, &cancel).await {
                            break Err(err);
                        }
                    }
                    None => {
                        debug!("change channel closed");
                        break Ok(());
                    }
                },
            }
        };

        if let Some(run) = state.current.take() {
            run.stop().await;
        }
        info!("supervisor stopped");
        outcome
    }

    fn start(&self, state: &mut State, cancel: &CancellationToken) -> Result<()> {
        let run = RunHandle::spawn(state.next_id, &self.command, cancel)?;
        state.next_id += 1;
        state.current = Some(run);
        Ok(())
    }

    fn on_termination(&self, termination: Termination) -> Result<()> {
        if termination.is_ignorable() {
            debug!(%termination, "run ended; waiting for changes");
            return Ok(());
        }
        error!(%termination, "command failed");
        termination.into_result()
    }

    async fn on_change(
        &self,
        event: ChangeEvent,
        state: &mut State,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let since = event.observed_at.saturating_duration_since(state.last_restart);
        if since < DEBOUNCE_WINDOW {
            debug!(path = ?event.path, ?since, "change within debounce window; coalesced");
            return Ok(());
        }

        info!(path = ?event.path, "change detected; restarting command");

        if let Some(run) = state.current.take() {
            let id = run.id();
            // Superseded run: its report is expected and swallowed.
            if let Some(termination) = run.stop().await {
                debug!(run = id, %termination, "superseded run ended");
            }
        }

        state.last_restart = event.observed_at;
        self.start(state, cancel)
    }
}

/// Resolves with the current run's termination; never resolves when there is
/// no run or its termination was already taken.
async fn next_termination(current: &mut Option<RunHandle>) -> Termination {
    match current {
        Some(run) => run.finished().await,
        None => std::future::pending().await,
    }
}
