//! Session behavior with fake providers: dispatch, drops, timeouts, caching.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use draftlab_core::data::{CancelToken, FetchError, FilterParams, RankCache, RankProvider};
use draftlab_core::domain::{CanonicalRecord, Position, ScoringMode, SourceId};
use draftlab_core::registry::{ProviderRegistry, SourceKind};
use draftlab_core::{DraftlabConfig, MergeOptions};
use draftlab_runner::{CompareOutcome, FetchProgress, RankSession, RunError, SessionSettings};

// ── Fakes ────────────────────────────────────────────────────────────

enum Behavior {
    Players(Vec<(&'static str, Position)>),
    Fail(FetchError),
    Hang,
}

struct FakeProvider {
    id: SourceId,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn new(id: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id: SourceId::new(id),
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RankProvider for FakeProvider {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn homepage(&self) -> &str {
        "https://example.invalid"
    }

    fn honors_scoring(&self) -> bool {
        false
    }

    fn fetch(
        &self,
        scoring: ScoringMode,
        params: &FilterParams,
        cancel: &CancelToken,
    ) -> Result<Vec<CanonicalRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Players(players) => params.narrow(
                &self.id,
                players
                    .iter()
                    .enumerate()
                    .map(|(i, (name, pos))| {
                        CanonicalRecord::new(name, *pos, i as u32 + 1, self.id.clone(), scoring)
                            .unwrap()
                    })
                    .collect(),
            ),
            Behavior::Fail(err) => Err(err.clone()),
            Behavior::Hang => {
                while !cancel.is_cancelled() {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(FetchError::Cancelled)
            }
        }
    }
}

fn session(providers: &[Arc<FakeProvider>], timeout: Duration) -> RankSession {
    let mut registry = ProviderRegistry::new();
    for p in providers {
        let provider: Arc<dyn RankProvider> = p.clone();
        registry.register(SourceKind::Csv, provider).unwrap();
    }
    RankSession::new(
        registry,
        Arc::new(RankCache::in_memory()),
        SessionSettings::default().with_timeout(timeout),
    )
}

fn smith_jones_a() -> Arc<FakeProvider> {
    FakeProvider::new(
        "A",
        Behavior::Players(vec![("Smith", Position::RB), ("Jones", Position::WR)]),
    )
}

fn smith_jones_b() -> Arc<FakeProvider> {
    FakeProvider::new(
        "B",
        Behavior::Players(vec![
            ("Jones", Position::WR),
            ("Filler", Position::TE),
            ("Smith", Position::RB),
        ]),
    )
}

fn compare(session: &RankSession, ids: &[&str]) -> Result<CompareOutcome, RunError> {
    session.compare(
        ids,
        ScoringMode::Ppr,
        &FilterParams::default(),
        &MergeOptions::default(),
        &CancelToken::new(),
        None,
    )
}

// ── Dispatch ─────────────────────────────────────────────────────────

#[test]
fn single_source_fetch_returns_its_ranking() {
    let s = session(&[smith_jones_b()], Duration::from_secs(5));
    let ranking = s
        .fetch_source("B", ScoringMode::Ppr, &FilterParams::default(), &CancelToken::new())
        .unwrap();
    assert_eq!(ranking.source, SourceId::new("B"));
    let names: Vec<&str> = ranking.records.iter().map(|r| r.player_name()).collect();
    assert_eq!(names, vec!["Jones", "Filler", "Smith"]);
    assert_eq!(ranking.scoring(), Some(ScoringMode::Ppr));
}

#[test]
fn single_source_filtered_to_nothing_names_the_source() {
    let s = session(&[smith_jones_a()], Duration::from_secs(5));
    let err = s
        .fetch_source(
            "A",
            ScoringMode::Ppr,
            &FilterParams::default().with_limit(0),
            &CancelToken::new(),
        )
        .unwrap_err();
    assert_eq!(err.source_id(), Some(&SourceId::new("A")));
    match err {
        RunError::Source { error, .. } => assert!(matches!(error, FetchError::Empty { .. })),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn two_sources_build_consensus() {
    let s = session(&[smith_jones_a(), smith_jones_b()], Duration::from_secs(5));
    let outcome = compare(&s, &["A", "B"]).unwrap();
    let CompareOutcome::Consensus { table, dropped } = outcome else {
        panic!("expected consensus");
    };
    assert!(dropped.is_empty());
    assert_eq!(table.rows()[0].player_name, "Jones");
    assert_eq!(table.rows()[0].consensus_rank, 1.5);
    let smith = table.rows().iter().find(|r| r.player_name == "Smith").unwrap();
    assert_eq!(smith.delta("A", "B"), Some(-2));
}

#[test]
fn failed_source_is_dropped_from_merge() {
    let broken = FakeProvider::new("C", Behavior::Fail(FetchError::NetworkUnreachable("dns".into())));
    let s = session(&[smith_jones_a(), smith_jones_b(), broken], Duration::from_secs(5));
    let outcome = compare(&s, &["A", "C", "B"]).unwrap();
    assert!(outcome.is_consensus());
    assert_eq!(outcome.dropped().len(), 1);
    assert_eq!(outcome.dropped()[0].source_id.as_str(), "C");
}

#[test]
fn one_survivor_falls_back_to_single_source() {
    let broken = FakeProvider::new("C", Behavior::Fail(FetchError::Other("boom".into())));
    let s = session(&[smith_jones_a(), broken], Duration::from_secs(5));
    let outcome = compare(&s, &["A", "C"]).unwrap();
    match outcome {
        CompareOutcome::SingleSource { ranking, dropped } => {
            assert_eq!(ranking.source.as_str(), "A");
            assert_eq!(ranking.records.len(), 2);
            assert_eq!(dropped.len(), 1);
        }
        other => panic!("expected single source, got {other:?}"),
    }
}

#[test]
fn lone_failing_source_names_itself() {
    let broken = FakeProvider::new("C", Behavior::Fail(FetchError::Empty { source_id: "C".into() }));
    let s = session(&[broken], Duration::from_secs(5));
    let err = compare(&s, &["C"]).unwrap_err();
    assert_eq!(err.source_id().map(SourceId::as_str), Some("C"));
    assert!(err.to_string().contains("'C'"));
}

#[test]
fn all_sources_failing_lists_every_drop() {
    let c = FakeProvider::new("C", Behavior::Fail(FetchError::Other("x".into())));
    let d = FakeProvider::new("D", Behavior::Fail(FetchError::Other("y".into())));
    let s = session(&[c, d], Duration::from_secs(5));
    match compare(&s, &["C", "D"]).unwrap_err() {
        RunError::NoSourcesAvailable { dropped } => assert_eq!(dropped.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_source_fails_before_fetching() {
    let a = smith_jones_a();
    let s = session(&[a.clone()], Duration::from_secs(5));
    let err = compare(&s, &["A", "nope"]).unwrap_err();
    assert!(matches!(err, RunError::UnknownSource(_)));
    assert_eq!(a.calls(), 0);
}

// ── Timeouts and cancellation ────────────────────────────────────────

#[test]
fn hanging_source_times_out_and_is_dropped() {
    let hang = FakeProvider::new("H", Behavior::Hang);
    let s = session(&[smith_jones_a(), smith_jones_b(), hang], Duration::from_millis(100));
    let outcome = compare(&s, &["A", "B", "H"]).unwrap();
    assert!(outcome.is_consensus());
    assert!(outcome.dropped()[0].error.is_timeout());
}

#[test]
fn cancelled_request_fetches_nothing() {
    let a = smith_jones_a();
    let s = session(&[a.clone()], Duration::from_secs(5));
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = s
        .fetch_source("A", ScoringMode::Ppr, &FilterParams::default(), &cancel)
        .unwrap_err();
    match err {
        RunError::Source { error, .. } => assert_eq!(error, FetchError::Cancelled),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(a.calls(), 0);
}

// ── Caching ──────────────────────────────────────────────────────────

#[test]
fn repeated_compare_is_served_from_cache() {
    let a = smith_jones_a();
    let b = smith_jones_b();
    let s = session(&[a.clone(), b.clone()], Duration::from_secs(5));
    compare(&s, &["A", "B"]).unwrap();
    compare(&s, &["A", "B"]).unwrap();
    assert_eq!((a.calls(), b.calls()), (1, 1));
    assert_eq!(s.cache().stats().hits, 2);
}

#[test]
fn duplicate_ids_fetch_once() {
    let a = smith_jones_a();
    let s = session(&[a.clone()], Duration::from_secs(5));
    let batch = s
        .fetch_sources(&["A", "A"], ScoringMode::Ppr, &FilterParams::default(), &CancelToken::new(), None)
        .unwrap();
    assert_eq!(batch.rankings.len(), 1);
    assert_eq!(a.calls(), 1);
}

#[test]
fn per_source_ttl_comes_from_config() {
    let config = DraftlabConfig::from_toml(
        r#"
        [cache]
        default_ttl_secs = 100

        [sources.A]
        ttl_secs = 5
        "#,
    )
    .unwrap();
    let settings = SessionSettings::from_config(&config);
    assert_eq!(settings.ttl_for("A"), Duration::from_secs(5));
    assert_eq!(settings.ttl_for("B"), Duration::from_secs(100));
}

#[test]
fn zero_ttl_always_refetches() {
    let a = smith_jones_a();
    let mut registry = ProviderRegistry::new();
    let provider: Arc<dyn RankProvider> = a.clone();
    registry.register(SourceKind::Csv, provider).unwrap();
    let s = RankSession::new(
        registry,
        Arc::new(RankCache::in_memory()),
        SessionSettings::default().with_default_ttl(Duration::ZERO),
    );
    for _ in 0..2 {
        s.fetch_source("A", ScoringMode::Ppr, &FilterParams::default(), &CancelToken::new())
            .unwrap();
    }
    assert_eq!(a.calls(), 2);
}

// ── Progress ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl FetchProgress for Recorder {
    fn on_start(&self, source: &str, _index: usize, _total: usize) {
        self.events.lock().unwrap().push(format!("start {source}"));
    }

    fn on_complete(
        &self,
        source: &str,
        _index: usize,
        _total: usize,
        result: &Result<usize, FetchError>,
    ) {
        let status = if result.is_ok() { "ok" } else { "fail" };
        self.events.lock().unwrap().push(format!("{status} {source}"));
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {succeeded}/{failed}/{total}"));
    }
}

#[test]
fn progress_reports_every_source() {
    let broken = FakeProvider::new("C", Behavior::Fail(FetchError::Other("x".into())));
    let s = session(&[smith_jones_a(), broken], Duration::from_secs(5));
    let recorder = Recorder::default();
    s.fetch_sources(
        &["A", "C"],
        ScoringMode::Ppr,
        &FilterParams::default(),
        &CancelToken::new(),
        Some(&recorder),
    )
    .unwrap();

    let events = recorder.events.lock().unwrap();
    assert!(events.contains(&"ok A".to_string()));
    assert!(events.contains(&"fail C".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("done 1/1/2"));
}
