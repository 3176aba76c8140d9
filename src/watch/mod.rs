// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling the `--path` / `--exclude` glob specifications into matchers.
//! - Selecting directories with an initial walk and subscribing each one
//!   through `notify` (non-recursively; recursion is emulated by subscribing
//!   directories as they appear).
//! - Turning raw notifications into [`ChangeEvent`](crate::event::ChangeEvent)s.
//!
//! It does **not** know about the supervised command; it only produces events.

pub mod event_handler;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use patterns::{PathMatcher, WatchSpec, DEFAULT_EXCLUDE, DEFAULT_INCLUDE};
pub use watcher::{DirectoryWatcher, WatchSession};
