pub mod builders;
pub mod fixtures;
pub mod probe;

use std::future::Future;
use std::time::Duration;

pub use fixtures::DirTree;
pub use probe::RunProbe;

/// Run a future with a 10-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}
