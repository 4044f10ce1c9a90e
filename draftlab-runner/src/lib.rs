//! DraftLab Runner: source resolution, bounded fetching and consensus dispatch.
//!
//! This crate builds on `draftlab-core` to provide:
//! - A ranking session over a provider registry and a shared cache
//! - Timeout-bounded provider calls with cooperative cancellation
//! - Concurrent multi-source fetches that drop failing sources
//! - Single-source vs consensus dispatch for `compare`

pub mod progress;
pub mod session;
pub mod timeout;

pub use progress::{FetchProgress, StderrProgress};
pub use session::{
    CompareOutcome, DroppedSource, FetchBatch, RankSession, RunError, SessionSettings,
};
pub use timeout::fetch_with_timeout;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn session_is_send_sync() {
        assert_send::<RankSession>();
        assert_sync::<RankSession>();
    }

    #[test]
    fn outcomes_are_send_sync() {
        assert_send::<CompareOutcome>();
        assert_sync::<CompareOutcome>();
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
