// src/exec/runner.rs

//! A single run of the supervised command.

use std::fmt;
use std::io::{self, Write};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, trace, warn};

use crate::errors::{RecmdError, Result};
use crate::exec::process_group;

/// How long a finished run waits for its output to be drained before it
/// reports. Only matters when a descendant escaped the group and still holds
/// the pipes.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How a run ended.
#[derive(Debug)]
pub enum Termination {
    Exited(ExitStatus),
    /// The run's cancellation token fired; the group was killed.
    Cancelled,
    WaitFailed(io::Error),
}

impl Termination {
    /// Ignorable terminations are by-products of the supervisor's own restarts
    /// and shutdowns: cancellation, a clean exit, or death by the group-kill
    /// signal.
    pub fn is_ignorable(&self) -> bool {
        match self {
            Termination::Cancelled => true,
            Termination::Exited(status) => status.success() || killed_by_group_signal(status),
            Termination::WaitFailed(_) => false,
        }
    }

    /// `Ok(())` for ignorable terminations, the genuine failure otherwise.
    pub fn into_result(self) -> Result<()> {
        if self.is_ignorable() {
            return Ok(());
        }
        match self {
            Termination::Exited(status) => Err(RecmdError::CommandFailed(status)),
            Termination::WaitFailed(err) => Err(RecmdError::IoError(err)),
            Termination::Cancelled => Ok(()),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(status) => write!(f, "{status}"),
            Termination::Cancelled => f.write_str("cancelled"),
            Termination::WaitFailed(err) => write!(f, "wait failed: {err}"),
        }
    }
}

#[cfg(unix)]
fn killed_by_group_signal(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(process_group::KILL_SIGNAL)
}

#[cfg(not(unix))]
fn killed_by_group_signal(_status: &ExitStatus) -> bool {
    false
}

/// The supervisor's handle on the current run.
///
/// - `cancel` is a child of the supervisor's token, so cancelling it stops
///   only this run.
/// - `pgid` is the process group led by the command.
/// - `done` yields the run's [`Termination`] exactly once.
#[derive(Debug)]
pub struct RunHandle {
    id: u64,
    pgid: Option<u32>,
    cancel: CancellationToken,
    done: Option<oneshot::Receiver<Termination>>,
}

impl RunHandle {
    /// Spawn `command` as a new process group leader and start draining its
    /// output. Spawning happens before this returns so the group id is known.
    pub fn spawn(id: u64, command: &[String], parent: &CancellationToken) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            return Err(RecmdError::ConfigError("no command to run".to_string()));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        process_group::isolate(&mut cmd);

        let child = cmd.spawn().map_err(|source| RecmdError::Spawn {
            program: program.clone(),
            source,
        })?;
        let pgid = child.id();
        info!(run = id, pid = ?pgid, ?command, "started command");

        let cancel = parent.child_token();
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(
            watch_child(child, pgid, cancel.clone(), done_tx).instrument(info_span!("run", id)),
        );

        Ok(Self {
            id,
            pgid,
            cancel,
            done: Some(done_rx),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pgid(&self) -> Option<u32> {
        self.pgid
    }

    /// True once the termination has been taken via [`finished`](Self::finished).
    pub fn is_reported(&self) -> bool {
        self.done.is_none()
    }

    /// Wait for the run to end. Cancel-safe; after the termination has been
    /// returned once, this never resolves again.
    pub async fn finished(&mut self) -> Termination {
        let Some(done) = self.done.as_mut() else {
            return std::future::pending().await;
        };
        let termination = done.await.unwrap_or_else(|_| {
            Termination::WaitFailed(io::Error::other("run task ended without reporting"))
        });
        self.done = None;
        termination
    }

    /// Cancel the run, kill its process group and wait until the command is
    /// gone. Returns the termination unless it was already taken.
    pub async fn stop(mut self) -> Option<Termination> {
        self.cancel.cancel();
        // A reported run already reaped its group; the id may be reused.
        if self.is_reported() {
            return None;
        }
        if let Some(pgid) = self.pgid {
            if let Err(err) = process_group::kill_group(pgid) {
                warn!(run = self.id, pgid, error = %err, "failed to kill process group");
            }
        }
        Some(self.finished().await)
    }
}

/// Owns the child for its whole life: waits for it (or for cancellation),
/// reaps whatever is left in its group, then reports.
async fn watch_child(
    mut child: Child,
    pgid: Option<u32>,
    cancel: CancellationToken,
    done: oneshot::Sender<Termination>,
) {
    let mut drains = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        drains.push(tokio::spawn(drain_lines(stdout, "stdout")));
    }
    if let Some(stderr) = child.stderr.take() {
        drains.push(tokio::spawn(drain_lines(stderr, "stderr")));
    }

    let termination = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => Termination::Exited(status),
            Err(err) => Termination::WaitFailed(err),
        },
        _ = cancel.cancelled() => {
            debug!("run cancelled; killing process group");
            if let Some(pgid) = pgid {
                if let Err(err) = process_group::kill_group(pgid) {
                    warn!(pgid, error = %err, "failed to kill process group");
                }
            }
            if let Err(err) = child.kill().await {
                debug!(error = %err, "leader already gone");
            }
            Termination::Cancelled
        }
    };

    // The leader is gone; take any descendants still in its group with it.
    if let Some(pgid) = pgid {
        if let Err(err) = process_group::kill_group(pgid) {
            warn!(pgid, error = %err, "failed to kill process group");
        }
    }

    for drain in drains {
        if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
            debug!("output still open after the command ended; leaving it to drain");
        }
    }

    if termination.is_ignorable() {
        debug!(%termination, "command ended");
    } else {
        info!(%termination, "command ended");
    }

    if done.send(termination).is_err() {
        debug!("supervisor no longer waiting for this run");
    }
}

/// Copy `reader` to our stdout line by line. Lines are raw bytes, so
/// non-UTF-8 output passes through untouched.
async fn drain_lines<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if !line.ends_with(b"\n") {
                    line.push(b'\n');
                }
                trace!(stream, "{}", String::from_utf8_lossy(&line).trim_end());
                write_line(&line);
            }
            Err(err) => {
                debug!(stream, error = %err, "reading command output failed");
                break;
            }
        }
    }
}

fn write_line(line: &[u8]) {
    let mut out = io::stdout().lock();
    // Keep draining even if our own stdout is gone, or the child blocks.
    let _ = out.write_all(line).and_then(|()| out.flush());
}
