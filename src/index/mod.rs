//! Index Builder: discovery, full-scan parallel build, incremental reuse,
//! watch-driven sub-file incremental updates, and persistence.

mod builder;
mod discover;
mod watch;

pub use builder::{CancellationToken, IndexBuilder, WatchApplyOptions, worker_count};
pub use watch::WatchSession;
