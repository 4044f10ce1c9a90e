//! Cache layer behavior through the public API.
//!
//! A call-counting fake provider stands in for the network; a manual clock
//! drives TTL expiry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use draftlab_core::data::cache::{CachePolicy, JsonFileStore, ManualClock, MemoryStore};
use draftlab_core::data::{
    CacheKey, CancelToken, FetchError, FilterParams, PositionFilter, RankCache, RankProvider,
};
use draftlab_core::domain::{CanonicalRecord, Position, ScoringMode, SourceId};

const HOUR: Duration = Duration::from_secs(3600);

// ── Fakes ────────────────────────────────────────────────────────────

struct CountingProvider {
    id: SourceId,
    calls: AtomicUsize,
    delay: Duration,
    fail: Mutex<Option<FetchError>>,
}

impl CountingProvider {
    fn new(id: &str) -> Self {
        Self {
            id: SourceId::new(id),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: Mutex::new(None),
        }
    }

    fn slow(id: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(id)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail_with(&self, err: Option<FetchError>) {
        *self.fail.lock().unwrap() = err;
    }
}

impl RankProvider for CountingProvider {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn homepage(&self) -> &str {
        "https://example.invalid"
    }

    fn honors_scoring(&self) -> bool {
        true
    }

    fn fetch(
        &self,
        scoring: ScoringMode,
        params: &FilterParams,
        _cancel: &CancelToken,
    ) -> Result<Vec<CanonicalRecord>, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if let Some(err) = self.fail.lock().unwrap().clone() {
            return Err(err);
        }
        let records = [("Smith", Position::RB), ("Jones", Position::WR), ("Brown", Position::QB)]
            .iter()
            .enumerate()
            .map(|(i, (name, pos))| {
                let name = format!("{name} {call}");
                CanonicalRecord::new(&name, *pos, i as u32 + 1, self.id.clone(), scoring).unwrap()
            })
            .collect();
        Ok(params.apply(records))
    }
}

fn fetch_through(
    cache: &RankCache,
    provider: &CountingProvider,
    params: &FilterParams,
    ttl: Duration,
) -> Result<Vec<CanonicalRecord>, FetchError> {
    let key = CacheKey::new(provider.id(), ScoringMode::Ppr, params);
    cache.get_or_fetch(&key, ttl, || {
        provider.fetch(ScoringMode::Ppr, params, &CancelToken::new())
    })
}

fn manual_cache() -> (RankCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_epoch());
    let cache = RankCache::with_clock(Arc::new(MemoryStore::new()), clock.clone());
    (cache, clock)
}

// ── TTL ──────────────────────────────────────────────────────────────

#[test]
fn entry_is_served_until_ttl_then_refetched() {
    let (cache, clock) = manual_cache();
    let provider = CountingProvider::new("fake");
    let params = FilterParams::default();

    let first = fetch_through(&cache, &provider, &params, HOUR).unwrap();

    clock.advance(Duration::from_secs(3599));
    let again = fetch_through(&cache, &provider, &params, HOUR).unwrap();
    assert_eq!(provider.calls(), 1);
    assert_eq!(first, again);

    clock.advance(Duration::from_secs(2));
    let refreshed = fetch_through(&cache, &provider, &params, HOUR).unwrap();
    assert_eq!(provider.calls(), 2);
    assert_ne!(first, refreshed);
}

#[test]
fn entry_expires_exactly_at_ttl() {
    let (cache, clock) = manual_cache();
    let provider = CountingProvider::new("fake");
    let params = FilterParams::default();

    fetch_through(&cache, &provider, &params, HOUR).unwrap();
    clock.advance(HOUR);
    fetch_through(&cache, &provider, &params, HOUR).unwrap();
    assert_eq!(provider.calls(), 2);
}

#[test]
fn ttl_is_judged_per_call() {
    let (cache, clock) = manual_cache();
    let provider = CountingProvider::new("fake");
    let params = FilterParams::default();

    fetch_through(&cache, &provider, &params, HOUR).unwrap();
    clock.advance(Duration::from_secs(120));
    fetch_through(&cache, &provider, &params, Duration::from_secs(60)).unwrap();
    assert_eq!(provider.calls(), 2);
}

#[test]
fn repeat_within_ttl_is_identical_and_counts_hits() {
    let (cache, _clock) = manual_cache();
    let provider = CountingProvider::new("fake");
    let params = FilterParams::default();

    let a = fetch_through(&cache, &provider, &params, HOUR).unwrap();
    let b = fetch_through(&cache, &provider, &params, HOUR).unwrap();
    assert_eq!(a, b);
    assert_eq!(provider.calls(), 1);
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

// ── Keys ─────────────────────────────────────────────────────────────

#[test]
fn limit_and_positions_never_share_entries() {
    let (cache, _clock) = manual_cache();
    let provider = CountingProvider::new("fake");

    let all = FilterParams::default();
    let top_two = FilterParams::default().with_limit(2);
    let rbs = FilterParams::default().with_positions(PositionFilter::only([Position::RB]));
    let no_rbs = FilterParams::default().with_positions(PositionFilter::except([Position::RB]));

    assert_eq!(fetch_through(&cache, &provider, &top_two, HOUR).unwrap().len(), 2);
    assert_eq!(fetch_through(&cache, &provider, &all, HOUR).unwrap().len(), 3);
    assert_eq!(fetch_through(&cache, &provider, &rbs, HOUR).unwrap().len(), 1);
    assert_eq!(fetch_through(&cache, &provider, &no_rbs, HOUR).unwrap().len(), 2);
    assert_eq!(provider.calls(), 4);
}

#[test]
fn scoring_mode_is_part_of_the_key() {
    let source = SourceId::new("fake");
    let params = FilterParams::default();
    let ppr = CacheKey::new(&source, ScoringMode::Ppr, &params);
    let half = CacheKey::new(&source, ScoringMode::HalfPpr, &params);
    assert_ne!(ppr, half);
    assert_ne!(ppr.digest(), half.digest());
}

// ── Failures ─────────────────────────────────────────────────────────

#[test]
fn cold_key_failure_propagates() {
    let (cache, _clock) = manual_cache();
    let provider = CountingProvider::new("fake");
    provider.fail_with(Some(FetchError::NetworkUnreachable("down".into())));

    let err = fetch_through(&cache, &provider, &FilterParams::default(), HOUR).unwrap_err();
    assert_eq!(err, FetchError::NetworkUnreachable("down".into()));
    assert_eq!(cache.stats().fetch_failures, 1);
}

#[test]
fn failed_refresh_keeps_stale_entry() {
    let (cache, clock) = manual_cache();
    let provider = CountingProvider::new("fake");
    let params = FilterParams::default();
    let key = CacheKey::new(provider.id(), ScoringMode::Ppr, &params);

    let original = fetch_through(&cache, &provider, &params, HOUR).unwrap();
    clock.advance(HOUR * 2);
    provider.fail_with(Some(FetchError::Http {
        status: 503,
        url: "https://example.invalid".into(),
    }));

    assert!(fetch_through(&cache, &provider, &params, HOUR).is_err());
    let kept = cache.peek(&key).expect("stale entry survives");
    assert_eq!(kept.payload, original);

    // Recovery replaces the entry whole.
    provider.fail_with(None);
    let fresh = fetch_through(&cache, &provider, &params, HOUR).unwrap();
    assert_eq!(cache.peek(&key).unwrap().payload, fresh);
}

#[test]
fn stale_if_error_serves_expired_payload() {
    let clock = Arc::new(ManualClock::at_epoch());
    let cache = RankCache::with_clock(Arc::new(MemoryStore::new()), clock.clone())
        .with_policy(CachePolicy {
            stale_if_error: true,
        });
    let provider = CountingProvider::new("fake");
    let params = FilterParams::default();

    let original = fetch_through(&cache, &provider, &params, HOUR).unwrap();
    clock.advance(HOUR * 3);
    provider.fail_with(Some(FetchError::Timeout {
        after: Duration::from_secs(30),
    }));

    let served = fetch_through(&cache, &provider, &params, HOUR).unwrap();
    assert_eq!(served, original);
    assert_eq!(cache.stats().stale_served, 1);
}

#[test]
fn empty_success_is_an_error_and_not_stored() {
    let (cache, _clock) = manual_cache();
    let key = CacheKey::new(&SourceId::new("nothing"), ScoringMode::Ppr, &FilterParams::default());
    let err = cache.get_or_fetch(&key, HOUR, || Ok(Vec::new())).unwrap_err();
    assert!(matches!(err, FetchError::Empty { .. }));
    assert!(cache.peek(&key).is_none());
}

// ── Concurrency ──────────────────────────────────────────────────────

#[test]
fn concurrent_same_key_callers_fetch_once() {
    let cache = Arc::new(RankCache::in_memory());
    let provider = Arc::new(CountingProvider::slow("fake", Duration::from_millis(50)));
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let provider = Arc::clone(&provider);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                fetch_through(&cache, &provider, &FilterParams::default(), HOUR).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(provider.calls(), 1);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn distinct_keys_do_not_serialize() {
    let cache = Arc::new(RankCache::in_memory());
    let a = Arc::new(CountingProvider::slow("a", Duration::from_millis(20)));
    let b = Arc::new(CountingProvider::slow("b", Duration::from_millis(20)));

    let ha = {
        let (cache, a) = (Arc::clone(&cache), Arc::clone(&a));
        thread::spawn(move || fetch_through(&cache, &a, &FilterParams::default(), HOUR))
    };
    let hb = {
        let (cache, b) = (Arc::clone(&cache), Arc::clone(&b));
        thread::spawn(move || fetch_through(&cache, &b, &FilterParams::default(), HOUR))
    };
    assert!(ha.join().unwrap().is_ok());
    assert!(hb.join().unwrap().is_ok());
    assert_eq!((a.calls(), b.calls()), (1, 1));
}

// ── Persistence ──────────────────────────────────────────────────────

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let provider = CountingProvider::new("fake");
    let params = FilterParams::default();

    let first = {
        let cache = RankCache::new(Arc::new(JsonFileStore::open(dir.path()).unwrap()));
        let records = fetch_through(&cache, &provider, &params, HOUR).unwrap();
        cache.flush().unwrap();
        records
    };

    let reopened = RankCache::new(Arc::new(JsonFileStore::open(dir.path()).unwrap()));
    let second = fetch_through(&reopened, &provider, &params, HOUR).unwrap();
    assert_eq!(first, second);
    assert_eq!(provider.calls(), 1);
    assert_eq!(reopened.entries().unwrap().len(), 1);
    assert_eq!(reopened.clear().unwrap(), 1);
}
