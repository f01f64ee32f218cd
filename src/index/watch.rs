//! Filesystem-watch wiring: debounces raw `notify` events into a
//! de-duplicated, sorted batch of absolute changed paths and delivers each
//! batch over a bounded channel, consumed one batch at a time by the
//! Builder. This is the coroutine-style watch loop the design notes call
//! for — the watcher and the parse pool never run concurrently against the
//! same `WatchState`.

use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Minimum debounce window the filesystem-watch contract requires.
pub const MIN_DEBOUNCE: Duration = Duration::from_millis(250);

fn should_skip(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name == ".DS_Store" {
        return true;
    }
    if name.ends_with(".swp") || name.ends_with(".swx") {
        return true;
    }
    if name.starts_with(".#") {
        return true;
    }
    false
}

/// A running watch session: owns the debouncer and the receive side of a
/// bounded channel of de-duplicated, sorted absolute-path batches.
pub struct WatchSession {
    _debouncer: notify_debouncer_full::Debouncer<
        notify::RecommendedWatcher,
        notify_debouncer_full::RecommendedCache,
    >,
    pub changes: crossbeam_channel::Receiver<Vec<PathBuf>>,
}

impl WatchSession {
    /// Starts watching `root` recursively with at least `MIN_DEBOUNCE`
    /// latency; batches are pushed to a bounded channel of capacity 16 so a
    /// slow-draining builder applies backpressure to the debouncer rather
    /// than buffering unboundedly.
    pub fn start(root: &Path, debounce: Duration) -> notify::Result<Self> {
        let debounce = debounce.max(MIN_DEBOUNCE);
        let (tx, rx) = crossbeam_channel::bounded::<Vec<PathBuf>>(16);

        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let mut paths: Vec<PathBuf> = events
                        .iter()
                        .flat_map(|e| e.event.paths.clone())
                        .filter(|p| !should_skip(p))
                        .collect();
                    paths.sort();
                    paths.dedup();
                    if !paths.is_empty() {
                        debug!(count = paths.len(), "debounced change batch");
                        let _ = tx.send(paths);
                    }
                }
                Err(errors) => {
                    for e in errors {
                        tracing::warn!(error = %e, "watch error");
                    }
                }
            }
        })?;

        debouncer.watch(root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), debounce_ms = debounce.as_millis(), "watch session started");

        Ok(Self {
            _debouncer: debouncer,
            changes: rx,
        })
    }
}
