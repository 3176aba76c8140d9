#![cfg(target_os = "linux")]

mod common;
use crate::common::{init_tracing, TestResult};

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use recmd::config::{RawWatchConfig, WatchConfig};
use recmd::errors::RecmdError;
use recmd::logging::LogSettings;
use recmd::watch_in;
use recmd_test_utils::probe::wait_gone;
use recmd_test_utils::{with_timeout, DirTree, RunProbe};

const START_TIMEOUT: Duration = Duration::from_secs(5);

fn config(path: &str, excludes: &[&str], command: Vec<String>) -> anyhow::Result<WatchConfig> {
    Ok(WatchConfig::try_from(RawWatchConfig {
        path: path.to_string(),
        excludes: excludes.iter().map(|s| s.to_string()).collect(),
        command,
        log: LogSettings::default(),
    })?)
}

#[tokio::test]
async fn file_change_restarts_the_command() -> TestResult {
    init_tracing();
    let tree = DirTree::with_dirs(&["src"])?;
    let probe = RunProbe::new()?;
    let cfg = config("src", &[], probe.command(&probe.sleep_with_child()))?;

    let cancel = CancellationToken::new();
    let task = {
        let cancel = cancel.clone();
        let base = tree.path().to_path_buf();
        tokio::spawn(async move { watch_in(&cfg, base, cancel).await })
    };

    let first = probe.wait_for_starts(1, START_TIMEOUT).await;
    assert_eq!(first.len(), 1);
    let children = probe.wait_for_children(1, START_TIMEOUT).await;

    // Leave the debounce window of the initial start.
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    tree.write("src/main.rs", "changed")?;

    let starts = probe.wait_for_starts(2, START_TIMEOUT).await;
    assert_eq!(starts.len(), 2);
    assert!(wait_gone(first[0], START_TIMEOUT).await);
    assert!(wait_gone(children[0], START_TIMEOUT).await);

    cancel.cancel();
    with_timeout(task).await??;
    Ok(())
}

#[tokio::test]
async fn changes_outside_the_pattern_do_not_restart() -> TestResult {
    init_tracing();
    let tree = DirTree::with_dirs(&["src", "docs"])?;
    let probe = RunProbe::new()?;
    let cfg = config("src/**/*.rs", &[], probe.command("sleep 30"))?;

    let cancel = CancellationToken::new();
    let task = {
        let cancel = cancel.clone();
        let base = tree.path().to_path_buf();
        tokio::spawn(async move { watch_in(&cfg, base, cancel).await })
    };

    probe.wait_for_starts(1, START_TIMEOUT).await;
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    tree.write("docs/guide.md", "x")?;
    tree.write("src/notes.txt", "x")?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(probe.starts().len(), 1);

    cancel.cancel();
    with_timeout(task).await??;
    Ok(())
}

#[tokio::test]
async fn command_failure_shuts_everything_down() -> TestResult {
    init_tracing();
    let tree = DirTree::new()?;
    let cfg = config("**/*", &[], vec!["sh".into(), "-c".into(), "exit 2".into()])?;

    let cancel = CancellationToken::new();
    let err = with_timeout(watch_in(&cfg, tree.path().to_path_buf(), cancel.clone()))
        .await
        .expect_err("failing command should surface");
    assert!(matches!(err, RecmdError::CommandFailed(_)), "got {err:?}");
    assert!(cancel.is_cancelled(), "watcher should have been cancelled");
    Ok(())
}

#[tokio::test]
async fn missing_watch_root_fails_before_starting() -> TestResult {
    init_tracing();
    let tree = DirTree::new()?;
    let probe = RunProbe::new()?;
    let cfg = config("missing", &[], probe.command("true"))?;

    let err = watch_in(&cfg, tree.path().to_path_buf(), CancellationToken::new())
        .await
        .expect_err("missing root");
    assert!(matches!(err, RecmdError::WatchRoot { .. }), "got {err:?}");
    assert!(probe.starts().is_empty());
    Ok(())
}
