use std::path::PathBuf;
use std::time::{Duration, Instant};

use recmd::event::ChangeEvent;

/// Builds change events at fixed offsets from a shared origin, so debounce
/// tests do not depend on wall-clock sleeps.
pub struct ChangeEventBuilder {
    origin: Instant,
    path: PathBuf,
}

impl ChangeEventBuilder {
    /// Events relative to "now".
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(origin: Instant) -> Self {
        Self {
            origin,
            path: PathBuf::from("src/main.rs"),
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// An event observed `offset` after the origin.
    pub fn at(&self, offset: Duration) -> ChangeEvent {
        ChangeEvent::new(self.path.clone(), self.origin + offset)
    }

    pub fn at_millis(&self, millis: u64) -> ChangeEvent {
        self.at(Duration::from_millis(millis))
    }
}

impl Default for ChangeEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}
