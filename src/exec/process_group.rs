// src/exec/process_group.rs

//! Process-group plumbing.
//!
//! Every run is started as the leader of a fresh process group so the whole
//! tree it spawns can be killed with one signal.

use std::io;

use tokio::process::Command;

/// Signal used to tear down a run's process group.
#[cfg(unix)]
pub const KILL_SIGNAL: i32 = libc::SIGKILL;
#[cfg(not(unix))]
pub const KILL_SIGNAL: i32 = 9;

/// Make the spawned child the leader of a new process group.
pub fn isolate(cmd: &mut Command) -> &mut Command {
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Send [`KILL_SIGNAL`] to every process in the group led by `pgid`.
///
/// A group that no longer exists is not an error.
#[cfg(unix)]
pub fn kill_group(pgid: u32) -> io::Result<()> {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("process group id {pgid} out of range"),
        ));
    };
    // killpg(0, ..) would hit our own group.
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "refusing to signal process group 0",
        ));
    }

    // SAFETY: killpg has no memory-safety preconditions.
    let rc = unsafe { libc::killpg(pgid, KILL_SIGNAL) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

/// Without process groups only the leader can be killed, which the runner
/// already does through the child handle.
#[cfg(not(unix))]
pub fn kill_group(_pgid: u32) -> io::Result<()> {
    Ok(())
}
