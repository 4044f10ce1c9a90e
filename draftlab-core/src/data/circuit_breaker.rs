//! Circuit breaker for HTTP ranking sources.
//!
//! A 403 trips the breaker immediately; repeated 429/5xx responses trip it
//! after `failure_threshold` consecutive failures. While open, every request
//! is refused with `FetchError::CircuitOpen` until the cooldown elapses.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    inner: Mutex<BreakerInner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// 15-minute cooldown after 3 consecutive failures.
    pub fn for_source(name: impl Into<String>) -> Self {
        Self::new(name, Duration::from_secs(15 * 60), 3)
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when requests may go out. An expired cooldown closes the breaker.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.inner();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } if tripped_at.elapsed() >= self.cooldown => {
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        self.inner().consecutive_failures = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold
            && inner.state == BreakerState::Closed
        {
            warn!(source = %self.name, failures = inner.consecutive_failures, "circuit breaker tripped");
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
        }
    }

    /// Open immediately (the source has blocked us).
    pub fn trip(&self) {
        warn!(source = %self.name, "circuit breaker tripped by block response");
        self.inner().state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    pub fn remaining_cooldown(&self) -> Duration {
        match self.inner().state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}
