//! Time-bounded cache in front of every provider.
//!
//! All reads and writes go through [`RankCache::get_or_fetch`]. A per-key
//! lock makes read-check-fetch-write atomic for one key: concurrent callers
//! for the same key wait for the first fetch and are then served from its
//! stored entry. Distinct keys never block each other.
//!
//! A failed fetch never overwrites or evicts an existing entry. By default
//! the error is returned; with `stale_if_error` the stale payload is served.

pub mod clock;
pub mod key;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::CacheKey;
pub use store::{CacheEntry, CacheError, CacheStore, JsonFileStore, MemoryStore};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::provider::FetchError;
use crate::domain::CanonicalRecord;

/// What to do when a refresh fails and an expired entry exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub stale_if_error: bool,
}

/// Counters since the cache was opened.
#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_served: AtomicU64,
    fetch_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_served: u64,
    pub fetch_failures: u64,
}

/// Cache handle. Open once per process and share it via `Arc`.
pub struct RankCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    counters: CacheCounters,
}

impl RankCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            policy: CachePolicy::default(),
            key_locks: Mutex::new(HashMap::new()),
            counters: CacheCounters::default(),
        }
    }

    /// In-memory cache, for tests and `--no-persist` runs.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Return the live entry for `key`, or run `fetch` and store its result.
    ///
    /// The returned records are a copy; callers may reorder or filter them
    /// without affecting the stored entry.
    pub fn get_or_fetch<F>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<Vec<CanonicalRecord>, FetchError>
    where
        F: FnOnce() -> Result<Vec<CanonicalRecord>, FetchError>,
    {
        let lock = self.key_lock(key.as_str());
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.read_check_fetch_write(key, ttl, fetch)
        };
        self.release_key_lock(key.as_str(), lock);
        result
    }

    fn read_check_fetch_write<F>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<Vec<CanonicalRecord>, FetchError>
    where
        F: FnOnce() -> Result<Vec<CanonicalRecord>, FetchError>,
    {
        let existing = match self.store.get(key.as_str()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, "cache read failed, treating as miss: {e}");
                None
            }
        };

        if let Some(entry) = &existing {
            if entry.is_fresh(self.clock.now(), ttl) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, records = entry.payload.len(), "cache hit");
                return Ok(entry.payload.clone());
            }
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, stale = existing.is_some(), "cache miss");

        let fetched = fetch().and_then(|records| {
            if records.is_empty() {
                Err(FetchError::Empty {
                    source_id: key.source().clone(),
                })
            } else {
                Ok(records)
            }
        });

        match fetched {
            Ok(records) => {
                let entry = CacheEntry {
                    key: key.as_str().to_string(),
                    payload: records.clone(),
                    fetched_at: self.clock.now(),
                    ttl_secs: ttl.as_secs(),
                };
                if let Err(e) = self.store.put(key.as_str(), &entry) {
                    warn!(key = %key, "cache write failed: {e}");
                }
                Ok(records)
            }
            Err(err) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                match existing {
                    Some(stale) if self.policy.stale_if_error => {
                        self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            key = %key,
                            age_secs = stale.age_secs(self.clock.now()),
                            "refresh failed ({err}); serving stale entry"
                        );
                        Ok(stale.payload)
                    }
                    _ => Err(err),
                }
            }
        }
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the per-key lock once no other caller holds or waits on it.
    fn release_key_lock(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    /// The stored entry for `key`, fresh or not, without fetching.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.store.get(key.as_str()).ok().flatten()
    }

    pub fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        let lock = self.key_lock(key.as_str());
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.store.remove(key.as_str())
        };
        self.release_key_lock(key.as_str(), lock);
        result
    }

    pub fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        self.store.entries()
    }

    pub fn clear(&self) -> Result<usize, CacheError> {
        self.store.clear()
    }

    pub fn flush(&self) -> Result<(), CacheError> {
        self.store.flush()
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale_served: self.counters.stale_served.load(Ordering::Relaxed),
            fetch_failures: self.counters.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RankCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankCache")
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Convert a std duration to chrono, saturating at roughly a millennium.
pub(crate) fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::weeks(52 * 1000))
}
