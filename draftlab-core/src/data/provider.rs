//! Ranking provider trait, fetch parameters and structured fetch errors.
//!
//! The `RankProvider` trait abstracts over ranking sources (editorial
//! snapshots, the Sleeper API, local sheets) so implementations can be swapped
//! and faked in tests. The cache layer sits above this trait: providers never
//! cache.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cancel::CancelToken;
use crate::domain::{CanonicalRecord, Position, ScoringMode, SourceId};

/// Structured error types for fetch operations.
///
/// Displayable in CLI output; the runner attaches the failing source id.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("no rankings parsed from '{source_id}'")]
    Empty { source_id: SourceId },

    #[error("provider blocked by circuit breaker ({remaining_secs}s cooldown left)")]
    CircuitOpen { remaining_secs: u64 },

    #[error("timed out after {}s", after.as_secs_f64())]
    Timeout { after: Duration },

    #[error("fetch cancelled")]
    Cancelled,

    #[error("read error: {0}")]
    Io(String),

    #[error("fetch error: {0}")]
    Other(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }

    /// Transient failures worth another attempt within the same fetch.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::NetworkUnreachable(_)
                | FetchError::RateLimited { .. }
                | FetchError::Http { status: 500..=599, .. }
        )
    }
}

/// Which positions a request keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "positions", rename_all = "snake_case")]
pub enum PositionFilter {
    #[default]
    Any,
    /// Keep only these positions.
    Only(BTreeSet<Position>),
    /// Keep everything except these positions.
    Except(BTreeSet<Position>),
}

impl PositionFilter {
    pub fn only(positions: impl IntoIterator<Item = Position>) -> Self {
        let set: BTreeSet<Position> = positions.into_iter().collect();
        if set.is_empty() {
            PositionFilter::Any
        } else {
            PositionFilter::Only(set)
        }
    }

    pub fn except(positions: impl IntoIterator<Item = Position>) -> Self {
        let set: BTreeSet<Position> = positions.into_iter().collect();
        if set.is_empty() {
            PositionFilter::Any
        } else {
            PositionFilter::Except(set)
        }
    }

    pub fn allows(&self, position: Position) -> bool {
        match self {
            PositionFilter::Any => true,
            PositionFilter::Only(set) => set.contains(&position),
            PositionFilter::Except(set) => !set.contains(&position),
        }
    }

    /// Deterministic text form, used in cache keys.
    pub fn key_fragment(&self) -> String {
        let join = |set: &BTreeSet<Position>| {
            set.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(",")
        };
        match self {
            PositionFilter::Any => "any".to_string(),
            PositionFilter::Only(set) => format!("only:{}", join(set)),
            PositionFilter::Except(set) => format!("except:{}", join(set)),
        }
    }
}

/// Parameters that narrow a provider's result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterParams {
    /// Cap on returned records, applied after ranking and position filtering.
    pub limit: Option<usize>,
    pub positions: PositionFilter,
}

impl FilterParams {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_positions(mut self, positions: PositionFilter) -> Self {
        self.positions = positions;
        self
    }

    /// Apply the position filter then the limit to a fully ranked list.
    ///
    /// Ranks are kept as-is, so a filtered list may be sparse.
    pub fn apply(&self, ranked: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
        let filtered = ranked
            .into_iter()
            .filter(|r| self.positions.allows(r.position()));
        match self.limit {
            Some(limit) => filtered.take(limit).collect(),
            None => filtered.collect(),
        }
    }

    /// [`apply`](Self::apply) for provider output: a filter that leaves
    /// nothing is `FetchError::Empty`, never an empty success.
    pub fn narrow(
        &self,
        source_id: &SourceId,
        ranked: Vec<CanonicalRecord>,
    ) -> Result<Vec<CanonicalRecord>, FetchError> {
        let kept = self.apply(ranked);
        if kept.is_empty() {
            return Err(FetchError::Empty {
                source_id: source_id.clone(),
            });
        }
        Ok(kept)
    }
}

/// Trait for ranking providers.
///
/// `fetch` returns the provider's rankings ordered ascending by rank, with the
/// whole known universe ranked before `params` are applied. Implementations
/// must fail rather than return an empty list, and should check `cancel`
/// between network attempts.
pub trait RankProvider: Send + Sync {
    fn id(&self) -> &SourceId;

    /// Public page the rankings come from, for attribution.
    fn homepage(&self) -> &str;

    /// False for sources that publish one list regardless of scoring (ADP,
    /// editorial snapshots). Such providers accept the mode and stamp it on
    /// their records but do not vary their output by it.
    fn honors_scoring(&self) -> bool;

    fn fetch(
        &self,
        scoring: ScoringMode,
        params: &FilterParams,
        cancel: &CancelToken,
    ) -> Result<Vec<CanonicalRecord>, FetchError>;
}
