// src/watch/watcher.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use crate::errors::{RecmdError, Result};
use crate::event::ChangeEvent;
use crate::watch::event_handler::{self, PathState};
use crate::watch::path_utils::{base_name, relative_str};
use crate::watch::patterns::{PathMatcher, WatchSpec};

/// Selects directories to watch and turns raw notifications into
/// [`ChangeEvent`]s.
///
/// All relative paths (the watch root, the matched directories, the paths fed
/// to the matcher) are resolved against `base`, which is the working
/// directory in production.
#[derive(Debug, Clone)]
pub struct DirectoryWatcher {
    matcher: PathMatcher,
    base: PathBuf,
    root: PathBuf,
}

impl DirectoryWatcher {
    pub fn new(spec: &WatchSpec, base: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            matcher: spec.compile()?,
            base: base.into(),
            root: spec.watch_root(),
        })
    }

    /// Every directory under the watch root that should be subscribed, in
    /// walk order (pre-order, siblings sorted by name), relative to the base.
    ///
    /// Subtrees removed whole by an exclusion are not descended into. Failing
    /// to read the watch root itself is fatal.
    pub fn compute_watch_dirs(&self) -> Result<Vec<PathBuf>> {
        self.walk_matching(&self.root)
    }

    /// Subscribe every selected directory and return the running session.
    pub fn subscribe(self) -> Result<WatchSession> {
        let dirs = self.compute_watch_dirs()?;

        // notify calls back on its own thread; hand events over to async land.
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let notify = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // Fails only once the session is gone.
                let _ = raw_tx.send(res);
            },
            Config::default(),
        )?;

        let mut session = WatchSession {
            watcher: self,
            notify,
            subscribed: HashSet::new(),
            raw_rx,
        };

        for dir in &dirs {
            let abs = session.watcher.absolute(dir);
            session.add(&abs)?;
        }

        if dirs.is_empty() {
            warn!(
                root = ?session.watcher.root,
                "no directories match the watch pattern; nothing will be reported"
            );
        }
        info!(
            root = ?session.watcher.root,
            pattern = %session.watcher.matcher.include().spec(),
            directories = dirs.len(),
            "watching directories"
        );

        Ok(session)
    }

    /// Subscribe and run until `cancel` fires or a fatal error occurs.
    pub async fn run(
        self,
        output: mpsc::Sender<ChangeEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.subscribe()?.run(output, cancel).await
    }

    fn absolute(&self, rel: &Path) -> PathBuf {
        if rel == Path::new(".") {
            self.base.clone()
        } else {
            self.base.join(rel)
        }
    }

    fn walk_matching(&self, start: &Path) -> Result<Vec<PathBuf>> {
        let start_abs = self.absolute(start);
        let mut dirs = Vec::new();

        let walk = WalkDir::new(&start_abs)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(entry.file_type().is_dir() && self.is_pruned(entry.path())));

        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(RecmdError::WatchRoot {
                        path: start_abs,
                        source,
                    });
                }
                Err(err) => {
                    warn!(error = %err, "skipping unreadable path while walking");
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let Some(rel) = relative_str(&self.base, entry.path()) else {
                continue;
            };
            if self.matcher.is_watch_dir(&rel) {
                dirs.push(display_path(&rel));
            }
        }

        Ok(dirs)
    }

    fn is_pruned(&self, abs: &Path) -> bool {
        relative_str(&self.base, abs).is_some_and(|rel| self.matcher.is_pruned(&rel))
    }
}

/// A live set of subscriptions plus the event loop that feeds on them.
pub struct WatchSession {
    watcher: DirectoryWatcher,
    notify: RecommendedWatcher,
    subscribed: HashSet<PathBuf>,
    raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("base", &self.watcher.base)
            .field("subscribed", &self.subscribed.len())
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    /// Event loop. Sends are awaited, so a slow receiver throttles the
    /// watcher. Returns `Ok(())` on cancellation or once the receiver is
    /// gone.
    pub async fn run(
        mut self,
        output: mpsc::Sender<ChangeEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        loop {
            let raw = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("watcher cancelled");
                    return Ok(());
                }
                raw = self.raw_rx.recv() => raw,
            };

            let event = match raw {
                Some(Ok(event)) => event,
                Some(Err(err)) => {
                    warn!(error = %err, "filesystem watch error");
                    continue;
                }
                None => return Err(RecmdError::EventStreamClosed),
            };

            trace!(?event, "received notify event");
            if !event_handler::is_relevant(&event.kind) {
                continue;
            }

            for (index, path) in event.paths.iter().enumerate() {
                let Some(change) = self.process_path(&event.kind, index, path).await? else {
                    continue;
                };

                debug!(path = ?change.path, "change detected");
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    sent = output.send(change) => {
                        if sent.is_err() {
                            debug!("change receiver dropped; stopping watcher");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn process_path(
        &mut self,
        kind: &EventKind,
        index: usize,
        path: &Path,
    ) -> Result<Option<ChangeEvent>> {
        let observed_at = Instant::now();

        match event_handler::inspect(kind, index, path).await? {
            PathState::Vanished => {
                debug!(?path, "path vanished before it could be inspected");
                self.forget(path);
                return Ok(None);
            }
            PathState::Directory => self.subscribe_tree(path).await,
            PathState::Removed => self.forget(path),
            PathState::File => {}
        }

        let reportable = match relative_str(&self.watcher.base, path) {
            Some(rel) => self.watcher.matcher.is_reportable(&rel),
            None => base_name(path).is_some_and(|name| self.watcher.matcher.matches_file_name(&name)),
        };

        Ok(reportable.then(|| ChangeEvent::new(path, observed_at)))
    }

    /// Subscribe a directory that appeared after start-up, along with any
    /// qualifying directories already created beneath it. The walk runs on
    /// the blocking pool.
    async fn subscribe_tree(&mut self, dir: &Path) {
        let Some(rel) = relative_str(&self.watcher.base, dir) else {
            warn!(path = ?dir, base = ?self.watcher.base, "new directory is outside the watch base");
            return;
        };

        if self.watcher.matcher.is_pruned(&rel) {
            trace!(path = ?dir, "new directory is excluded with its subtree");
            return;
        }

        let watcher = self.watcher.clone();
        let start = display_path(&rel);
        let walked = tokio::task::spawn_blocking(move || watcher.walk_matching(&start)).await;

        let dirs = match walked {
            Ok(Ok(dirs)) => dirs,
            Ok(Err(err)) => {
                warn!(path = ?dir, error = %err, "failed to inspect new directory");
                return;
            }
            Err(err) => {
                warn!(path = ?dir, error = %err, "directory walk task failed");
                return;
            }
        };

        for dir in dirs {
            let abs = self.watcher.absolute(&dir);
            if let Err(err) = self.add(&abs) {
                warn!(path = ?abs, error = %err, "failed to watch new directory");
            }
        }
    }

    fn add(&mut self, abs: &Path) -> Result<()> {
        if self.subscribed.contains(abs) {
            return Ok(());
        }
        self.notify.watch(abs, RecursiveMode::NonRecursive)?;
        debug!(path = ?abs, "watching directory");
        self.subscribed.insert(abs.to_path_buf());
        Ok(())
    }

    /// Drop `path` and every subscribed directory beneath it, so that a
    /// directory recreated under the same name is watched afresh.
    fn forget(&mut self, path: &Path) {
        let gone: Vec<PathBuf> = self
            .subscribed
            .iter()
            .filter(|dir| dir.starts_with(path))
            .cloned()
            .collect();

        for dir in gone {
            self.subscribed.remove(&dir);
            // A directory renamed away keeps its watch under the old name.
            if let Err(err) = self.notify.unwatch(&dir) {
                debug!(path = ?dir, error = %err, "unwatch of departed directory failed");
            } else {
                debug!(path = ?dir, "stopped watching departed directory");
            }
        }
    }
}

fn display_path(rel: &str) -> PathBuf {
    let trimmed = rel.trim_end_matches('/');
    if trimmed.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(trimmed)
    }
}
