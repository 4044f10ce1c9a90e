//! Progress callbacks for multi-source fetches.

use draftlab_core::data::FetchError;

/// Trait for reporting per-source fetch progress.
///
/// Called from worker threads, so implementations must be `Sync`.
pub trait FetchProgress: Send + Sync {
    /// Called when a source fetch starts.
    fn on_start(&self, source: &str, index: usize, total: usize);

    /// Called when a source fetch completes; `Ok` carries the record count.
    fn on_complete(
        &self,
        source: &str,
        index: usize,
        total: usize,
        result: &Result<usize, FetchError>,
    );

    /// Called when the whole batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that writes one line per event to stderr.
pub struct StderrProgress;

impl FetchProgress for StderrProgress {
    fn on_start(&self, source: &str, index: usize, total: usize) {
        eprintln!("[{}/{}] fetching {source}...", index + 1, total);
    }

    fn on_complete(
        &self,
        source: &str,
        index: usize,
        total: usize,
        result: &Result<usize, FetchError>,
    ) {
        match result {
            Ok(n) => eprintln!("[{}/{}] {source}: {n} players", index + 1, total),
            Err(e) => eprintln!("[{}/{}] {source}: FAILED: {e}", index + 1, total),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        eprintln!("fetched {succeeded}/{total} sources ({failed} failed)");
    }
}
