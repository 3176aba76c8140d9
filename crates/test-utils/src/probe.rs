//! Shell commands that leave a trace of every start, so tests can count
//! restarts and check that old processes are gone.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tempfile::TempDir;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const STARTS: &str = "starts";
const CHILDREN: &str = "children";

pub struct RunProbe {
    dir: TempDir,
}

impl RunProbe {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("recmd-probe-")
            .tempdir()
            .context("creating probe dir")?;
        Ok(Self { dir })
    }

    /// File a command body can append pids or markers to.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// `sh -c` command that appends its pid to the starts file, then runs
    /// `body` in the same shell.
    pub fn command(&self, body: &str) -> Vec<String> {
        let script = format!("echo $$ >> '{}'; {body}", self.file(STARTS).display());
        vec!["sh".to_string(), "-c".to_string(), script]
    }

    /// Command body that backgrounds a long `sleep`, records its pid in the
    /// `children` file and waits for it.
    pub fn sleep_with_child(&self) -> String {
        format!(
            "sleep 30 & echo $! >> '{}'; wait",
            self.file(CHILDREN).display()
        )
    }

    /// Pids recorded by [`sleep_with_child`](Self::sleep_with_child).
    pub fn children(&self) -> Vec<u32> {
        self.read_pids(CHILDREN)
    }

    /// Pids of every run started so far, oldest first.
    pub fn starts(&self) -> Vec<u32> {
        self.read_pids(STARTS)
    }

    /// Poll until at least `n` runs have started. Returns the pids seen.
    pub async fn wait_for_starts(&self, n: usize, timeout: Duration) -> Vec<u32> {
        self.wait_for_pids(STARTS, n, timeout).await
    }

    /// Pids written to `name`, one per line.
    pub fn read_pids(&self, name: &str) -> Vec<u32> {
        fs::read_to_string(self.file(name))
            .unwrap_or_default()
            .lines()
            .filter_map(|l| l.trim().parse().ok())
            .collect()
    }

    pub async fn wait_for_children(&self, n: usize, timeout: Duration) -> Vec<u32> {
        self.wait_for_pids(CHILDREN, n, timeout).await
    }

    /// Poll until `name` holds at least `n` pids or `timeout` elapses.
    pub async fn wait_for_pids(&self, name: &str, n: usize, timeout: Duration) -> Vec<u32> {
        let deadline = Instant::now() + timeout;
        loop {
            let pids = self.read_pids(name);
            if pids.len() >= n || Instant::now() >= deadline {
                return pids;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// True once `pid` no longer runs. Zombies count as gone: they are dead and
/// only wait to be reaped.
#[cfg(target_os = "linux")]
pub fn process_gone(pid: u32) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state == "Z" || state == "X"),
    }
}

/// Poll until `pid` is gone or `timeout` elapses.
#[cfg(target_os = "linux")]
pub async fn wait_gone(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if process_gone(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
