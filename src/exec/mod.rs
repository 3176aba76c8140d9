// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`supervisor`] owns the restart state machine and the single "current
//!   run" of the watched command.
//! - [`runner`] spawns one run, drains its output and reports how it ended.
//! - [`process_group`] starts runs as process group leaders and kills whole
//!   groups, so nothing the command spawned outlives a restart.

pub mod process_group;
pub mod runner;
pub mod supervisor;

pub use runner::{RunHandle, Termination};
pub use supervisor::{DEBOUNCE_WINDOW, Supervisor};
