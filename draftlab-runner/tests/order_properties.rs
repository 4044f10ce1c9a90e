//! Property tests for multi-source fetch ordering.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use draftlab_core::data::{CancelToken, FetchError, FilterParams, RankCache, RankProvider};
use draftlab_core::domain::{CanonicalRecord, Position, ScoringMode, SourceId};
use draftlab_core::registry::{ProviderRegistry, SourceKind};
use draftlab_runner::{RankSession, SessionSettings};

struct Fixed {
    id: SourceId,
    fail: bool,
}

impl RankProvider for Fixed {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn homepage(&self) -> &str {
        ""
    }

    fn honors_scoring(&self) -> bool {
        false
    }

    fn fetch(
        &self,
        scoring: ScoringMode,
        _params: &FilterParams,
        _cancel: &CancelToken,
    ) -> Result<Vec<CanonicalRecord>, FetchError> {
        if self.fail {
            return Err(FetchError::Other("scripted".into()));
        }
        Ok(vec![CanonicalRecord::new("Same Guy", Position::WR, 1, self.id.clone(), scoring)
            .unwrap()])
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Survivors come back in caller order and every id lands in exactly one list.
    #[test]
    fn survivors_keep_caller_order(failures in prop::collection::vec(any::<bool>(), 1..6)) {
        let ids: Vec<String> = (0..failures.len()).map(|i| format!("s{i}")).collect();
        let mut registry = ProviderRegistry::new();
        for (id, fail) in ids.iter().zip(&failures) {
            let provider = Fixed { id: SourceId::new(id.as_str()), fail: *fail };
            registry.register(SourceKind::Csv, Arc::new(provider)).unwrap();
        }
        let session = RankSession::new(
            registry,
            Arc::new(RankCache::in_memory()),
            SessionSettings::default().with_timeout(Duration::from_secs(5)),
        );

        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let batch = session
            .fetch_sources(&refs, ScoringMode::Ppr, &FilterParams::default(), &CancelToken::new(), None)
            .unwrap();

        let expected: Vec<&str> = refs
            .iter()
            .zip(&failures)
            .filter(|(_, fail)| !**fail)
            .map(|(id, _)| *id)
            .collect();
        let got: Vec<&str> = batch.rankings.iter().map(|r| r.source.as_str()).collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(batch.rankings.len() + batch.dropped.len(), ids.len());
    }
}
