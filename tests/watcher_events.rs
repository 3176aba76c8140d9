mod common;
use crate::common::{init_tracing, TestResult};

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use recmd::errors::Result as RecmdResult;
use recmd::event::ChangeEvent;
use recmd::watch::{DirectoryWatcher, WatchSpec};
use recmd_test_utils::DirTree;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    rx: mpsc::Receiver<ChangeEvent>,
    cancel: CancellationToken,
    task: JoinHandle<RecmdResult<()>>,
}

fn start(tree: &DirTree, include: &str, excludes: &[&str]) -> anyhow::Result<Running> {
    let spec = WatchSpec::new(include, excludes.iter().map(|e| e.to_string()).collect());
    let session = DirectoryWatcher::new(&spec, tree.path())?.subscribe()?;

    let (tx, rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(session.run(tx, cancel.clone()));
    Ok(Running { rx, cancel, task })
}

/// Receive events until one satisfies `pred`; returns every event seen.
async fn recv_until(
    rx: &mut mpsc::Receiver<ChangeEvent>,
    pred: impl Fn(&Path) -> bool,
) -> Vec<ChangeEvent> {
    let mut seen = Vec::new();
    loop {
        let event = timeout(EVENT_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for a change event")
            .expect("watcher stopped");
        let done = pred(&event.path);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn named(name: &'static str) -> impl Fn(&Path) -> bool {
    move |p: &Path| p.file_name().is_some_and(|n| n == name)
}

#[tokio::test]
async fn reports_file_writes_in_watched_directory() -> TestResult {
    init_tracing();
    let tree = DirTree::with_dirs(&["src"])?;
    let mut running = start(&tree, "**/*", &[])?;

    tree.write("src/main.rs", "fn main() {}")?;
    let seen = recv_until(&mut running.rx, named("main.rs")).await;
    let last = seen.last().expect("at least one event");
    assert_eq!(last.path, tree.join("src/main.rs"));

    running.cancel.cancel();
    running.task.await??;
    Ok(())
}

#[tokio::test]
async fn subscribes_directories_created_after_start() -> TestResult {
    init_tracing();
    let tree = DirTree::new()?;
    let mut running = start(&tree, "**/*", &[])?;

    tree.mkdirs("late")?;
    // The directory's own event is emitted after it has been subscribed.
    recv_until(&mut running.rx, named("late")).await;

    tree.write("late/new.txt", "hello")?;
    let seen = recv_until(&mut running.rx, named("new.txt")).await;
    assert_eq!(seen.last().map(|e| e.path.clone()), Some(tree.join("late/new.txt")));

    running.cancel.cancel();
    running.task.await??;
    Ok(())
}

#[tokio::test]
async fn subscribes_nested_directories_created_at_once() -> TestResult {
    init_tracing();
    let tree = DirTree::new()?;
    let mut running = start(&tree, "**/*", &[])?;

    tree.mkdirs("a/b/c")?;
    // `b` and `c` may exist before `a` is subscribed; they are picked up by
    // the walk beneath `a`, which finishes before `a` is reported.
    recv_until(&mut running.rx, named("a")).await;

    tree.write("a/b/c/deep.txt", "x")?;
    recv_until(&mut running.rx, named("deep.txt")).await;

    running.cancel.cancel();
    running.task.await??;
    Ok(())
}

#[tokio::test]
async fn excluded_directories_stay_silent() -> TestResult {
    init_tracing();
    let tree = DirTree::with_dirs(&["ignored", "src"])?;
    let mut running = start(&tree, "**/*", &["ignored"])?;

    tree.write("ignored/noise.txt", "x")?;
    tree.write("src/signal.txt", "x")?;

    let seen = recv_until(&mut running.rx, named("signal.txt")).await;
    assert!(
        seen.iter().all(|e| !e.path.starts_with(tree.join("ignored"))),
        "unexpected events: {seen:?}"
    );

    running.cancel.cancel();
    running.task.await??;
    Ok(())
}

#[tokio::test]
async fn excluded_directories_created_later_are_not_reported() -> TestResult {
    init_tracing();
    let tree = DirTree::new()?;
    let mut running = start(&tree, "**/*", &["node_modules"])?;

    tree.mkdirs("node_modules/pkg")?;
    tree.mkdirs(".git/objects")?;
    tree.write("node_modules/pkg/index.js", "x")?;
    tree.write("ready.txt", "x")?;

    let seen = recv_until(&mut running.rx, named("ready.txt")).await;
    assert!(
        seen.iter().all(|e| {
            !e.path.starts_with(tree.join("node_modules")) && !e.path.starts_with(tree.join(".git"))
        }),
        "unexpected events: {seen:?}"
    );

    running.cancel.cancel();
    running.task.await??;
    Ok(())
}

#[tokio::test]
async fn directory_recreated_after_rename_is_watched_again() -> TestResult {
    init_tracing();
    let tree = DirTree::with_dirs(&["src"])?;
    let mut running = start(&tree, "**/*", &[])?;

    std::fs::rename(tree.join("src"), tree.join("old"))?;
    recv_until(&mut running.rx, named("old")).await;
    // Let the rest of the rename notifications through before recreating.
    tokio::time::sleep(Duration::from_millis(300)).await;
    while running.rx.try_recv().is_ok() {}

    tree.mkdirs("src")?;
    recv_until(&mut running.rx, named("src")).await;

    tree.write("src/new.rs", "x")?;
    let seen = recv_until(&mut running.rx, named("new.rs")).await;
    assert_eq!(seen.last().map(|e| e.path.clone()), Some(tree.join("src/new.rs")));

    // The renamed directory no longer reports under its old name.
    tree.write("old/stale.rs", "x")?;
    tree.write("src/after.rs", "x")?;
    let seen = recv_until(&mut running.rx, named("after.rs")).await;
    assert!(
        seen.iter().all(|e| e.path != tree.join("src/stale.rs")),
        "unexpected events: {seen:?}"
    );

    running.cancel.cancel();
    running.task.await??;
    Ok(())
}

#[tokio::test]
async fn excluded_file_names_are_not_reported() -> TestResult {
    init_tracing();
    let tree = DirTree::new()?;
    let mut running = start(&tree, "**/*", &["**/*.log"])?;

    tree.write("debug.log", "x")?;
    tree.write("notes.txt", "x")?;

    let seen = recv_until(&mut running.rx, named("notes.txt")).await;
    assert!(
        seen.iter().all(|e| e.path.extension().is_none_or(|ext| ext != "log")),
        "unexpected events: {seen:?}"
    );

    running.cancel.cancel();
    running.task.await??;
    Ok(())
}

#[tokio::test]
async fn only_matching_file_names_are_reported() -> TestResult {
    init_tracing();
    let tree = DirTree::with_dirs(&["src"])?;
    let mut running = start(&tree, "src/**/*.rs", &[])?;

    tree.write("src/README.md", "x")?;
    tree.write("src/lib.rs", "x")?;

    let seen = recv_until(&mut running.rx, named("lib.rs")).await;
    assert!(
        seen.iter().all(|e| e.path.extension().is_some_and(|ext| ext == "rs")),
        "unexpected events: {seen:?}"
    );

    running.cancel.cancel();
    running.task.await??;
    Ok(())
}

#[tokio::test]
async fn timestamps_are_taken_at_detection() -> TestResult {
    init_tracing();
    let tree = DirTree::new()?;
    let mut running = start(&tree, "**/*", &[])?;

    let before = std::time::Instant::now();
    tree.write("stamp.txt", "x")?;
    let seen = recv_until(&mut running.rx, named("stamp.txt")).await;
    let after = std::time::Instant::now();

    let event = seen.last().expect("event");
    assert!(event.observed_at >= before && event.observed_at <= after);

    running.cancel.cancel();
    running.task.await??;
    Ok(())
}

#[tokio::test]
async fn stops_when_receiver_is_dropped() -> TestResult {
    init_tracing();
    let tree = DirTree::new()?;
    let running = start(&tree, "**/*", &[])?;
    drop(running.rx);

    tree.write("after-drop.txt", "x")?;
    let result = timeout(EVENT_TIMEOUT, running.task).await?;
    result??;
    Ok(())
}
