//! Timeout-bounded provider calls.
//!
//! The provider runs on its own thread with a child cancel token. The caller
//! waits up to the timeout, polling so that parent cancellation is noticed
//! promptly; on expiry the child token is cancelled and the worker is left
//! to wind down on its own.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use draftlab_core::data::{CancelToken, FetchError, FilterParams, RankProvider};
use draftlab_core::domain::{CanonicalRecord, ScoringMode};
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub fn fetch_with_timeout(
    provider: Arc<dyn RankProvider>,
    scoring: ScoringMode,
    params: &FilterParams,
    parent: &CancelToken,
    timeout: Duration,
) -> Result<Vec<CanonicalRecord>, FetchError> {
    if parent.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    let token = parent.child();
    let worker_token = token.clone();
    let worker_params = params.clone();
    let source = provider.id().clone();
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name(format!("fetch-{source}"))
        .spawn(move || {
            let result = provider.fetch(scoring, &worker_params, &worker_token);
            // The receiver is gone after a timeout; the result is discarded.
            let _ = tx.send(result);
        })
        .map_err(|e| FetchError::Other(format!("failed to spawn fetch worker: {e}")))?;

    let deadline = Instant::now() + timeout;
    loop {
        let now = Instant::now();
        if now >= deadline {
            token.cancel();
            warn!(source = %source, timeout_secs = timeout.as_secs_f64(), "fetch timed out");
            return Err(FetchError::Timeout { after: timeout });
        }
        match rx.recv_timeout((deadline - now).min(POLL_INTERVAL)) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) => {
                if parent.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(FetchError::Other(format!(
                    "fetch worker for '{source}' exited without a result"
                )));
            }
        }
    }
}
