//! Ranking session: ties the registry, the cache and fetch limits together.
//!
//! Entry points:
//! - `fetch_source()`: one source through cache and timeout. Used by `export`.
//! - `fetch_sources()`: several sources concurrently, survivors plus drops.
//! - `compare()`: fetch then merge, falling back to the single survivor.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use draftlab_core::config::{ConfigError, DraftlabConfig};
use draftlab_core::consensus::{merge, AggregationError, ConsensusTable, MergeOptions, SourceRanking};
use draftlab_core::data::{CacheKey, CancelToken, FetchError, FilterParams, RankCache, RankProvider};
use draftlab_core::domain::{ScoringMode, SourceId};
use draftlab_core::registry::{ProviderRegistry, UnknownSourceError};

use crate::progress::FetchProgress;
use crate::timeout::fetch_with_timeout;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("source '{source_id}' failed: {error}")]
    Source { source_id: SourceId, error: FetchError },

    #[error(transparent)]
    UnknownSource(#[from] UnknownSourceError),

    #[error("no sources available: {}", describe_dropped(.dropped))]
    NoSourcesAvailable { dropped: Vec<DroppedSource> },

    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("registry error: {0}")]
    Registry(String),
}

impl RunError {
    /// The source this error is attributed to, when there is exactly one.
    pub fn source_id(&self) -> Option<&SourceId> {
        match self {
            RunError::Source { source_id, .. } => Some(source_id),
            _ => None,
        }
    }
}

/// A source left out of a multi-source result, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedSource {
    pub source_id: SourceId,
    pub error: FetchError,
}

impl fmt::Display for DroppedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.source_id, self.error)
    }
}

impl Serialize for DroppedSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("DroppedSource", 2)?;
        s.serialize_field("source_id", &self.source_id)?;
        s.serialize_field("error", &self.error.to_string())?;
        s.end()
    }
}

fn describe_dropped(dropped: &[DroppedSource]) -> String {
    if dropped.is_empty() {
        return "none requested".to_string();
    }
    dropped
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Survivors in caller order plus the sources that failed.
#[derive(Debug, Clone)]
pub struct FetchBatch {
    pub rankings: Vec<SourceRanking>,
    pub dropped: Vec<DroppedSource>,
}

/// What `compare` produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompareOutcome {
    Consensus {
        table: ConsensusTable,
        dropped: Vec<DroppedSource>,
    },
    /// Only one source survived; its ranking is returned unmodified.
    SingleSource {
        ranking: SourceRanking,
        dropped: Vec<DroppedSource>,
    },
}

impl CompareOutcome {
    pub fn dropped(&self) -> &[DroppedSource] {
        match self {
            CompareOutcome::Consensus { dropped, .. } | CompareOutcome::SingleSource { dropped, .. } => {
                dropped
            }
        }
    }

    pub fn is_consensus(&self) -> bool {
        matches!(self, CompareOutcome::Consensus { .. })
    }
}

/// Freshness and time limits for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub default_ttl: Duration,
    pub ttl_overrides: BTreeMap<String, Duration>,
    /// Bound on one provider call, retries included.
    pub timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(draftlab_core::config::DEFAULT_TTL_SECS),
            ttl_overrides: BTreeMap::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &DraftlabConfig) -> Self {
        Self {
            default_ttl: config.default_ttl(),
            ttl_overrides: config.ttl_overrides(),
            timeout: config.fetch_timeout(),
        }
    }

    pub fn ttl_for(&self, source_id: &str) -> Duration {
        self.ttl_overrides
            .get(source_id)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

pub struct RankSession {
    registry: ProviderRegistry,
    cache: Arc<RankCache>,
    settings: SessionSettings,
}

impl RankSession {
    pub fn new(registry: ProviderRegistry, cache: Arc<RankCache>, settings: SessionSettings) -> Self {
        Self {
            registry,
            cache,
            settings,
        }
    }

    /// Session with the built-in sources plus every configured CSV sheet.
    pub fn from_config(config: &DraftlabConfig, cache: Arc<RankCache>) -> Result<Self, RunError> {
        config.validate()?;
        let mut registry = ProviderRegistry::with_builtin(config.http_settings())
            .map_err(|e| RunError::Registry(e.to_string()))?;
        for csv in &config.csv_sources {
            registry
                .register_csv(csv.id.trim(), csv.path.clone())
                .map_err(|e| RunError::Registry(e.to_string()))?;
        }
        Ok(Self::new(registry, cache, SessionSettings::from_config(config)))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<RankCache> {
        &self.cache
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Fetch one source through the cache, bounded by the session timeout.
    pub fn fetch_source(
        &self,
        id: &str,
        scoring: ScoringMode,
        params: &FilterParams,
        cancel: &CancelToken,
    ) -> Result<SourceRanking, RunError> {
        let provider = self.registry.resolve(id)?;
        let source = provider.id().clone();
        self.fetch_resolved(provider, scoring, params, cancel)
            .map(|records| SourceRanking::new(source.clone(), records))
            .map_err(|error| RunError::Source {
                source_id: source,
                error,
            })
    }

    /// Fetch several sources concurrently.
    ///
    /// Every id is resolved before any fetch starts. Repeated ids are fetched
    /// once. Failures are collected in `dropped` rather than aborting.
    pub fn fetch_sources(
        &self,
        ids: &[&str],
        scoring: ScoringMode,
        params: &FilterParams,
        cancel: &CancelToken,
        progress: Option<&dyn FetchProgress>,
    ) -> Result<FetchBatch, RunError> {
        let mut seen = HashSet::new();
        let mut providers: Vec<Arc<dyn RankProvider>> = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(*id) {
                warn!(source = %id, "source requested twice; fetching once");
                continue;
            }
            providers.push(self.registry.resolve(id)?);
        }

        let total = providers.len();
        let results: Vec<(SourceId, Result<Vec<_>, FetchError>)> = providers
            .par_iter()
            .enumerate()
            .map(|(index, provider)| {
                let id = provider.id().clone();
                if let Some(p) = progress {
                    p.on_start(id.as_str(), index, total);
                }
                let result = self.fetch_resolved(Arc::clone(provider), scoring, params, cancel);
                if let Some(p) = progress {
                    let summary = result.as_ref().map(Vec::len).map_err(Clone::clone);
                    p.on_complete(id.as_str(), index, total, &summary);
                }
                (id, result)
            })
            .collect();

        let mut batch = FetchBatch {
            rankings: Vec::with_capacity(total),
            dropped: Vec::new(),
        };
        for (source_id, result) in results {
            match result {
                Ok(records) => batch.rankings.push(SourceRanking::new(source_id, records)),
                Err(error) => {
                    warn!(source = %source_id, "dropping source: {error}");
                    batch.dropped.push(DroppedSource { source_id, error });
                }
            }
        }
        if let Some(p) = progress {
            p.on_batch_complete(batch.rankings.len(), batch.dropped.len(), total);
        }
        Ok(batch)
    }

    /// Fetch `ids` and merge the survivors.
    ///
    /// With one survivor its ranking is returned as-is. A lone requested
    /// source that fails is reported as `RunError::Source`.
    pub fn compare(
        &self,
        ids: &[&str],
        scoring: ScoringMode,
        params: &FilterParams,
        options: &MergeOptions,
        cancel: &CancelToken,
        progress: Option<&dyn FetchProgress>,
    ) -> Result<CompareOutcome, RunError> {
        let FetchBatch {
            mut rankings,
            mut dropped,
        } = self.fetch_sources(ids, scoring, params, cancel, progress)?;

        match rankings.len() {
            0 => {
                if dropped.len() == 1 {
                    let DroppedSource { source_id, error } = dropped.remove(0);
                    return Err(RunError::Source { source_id, error });
                }
                Err(RunError::NoSourcesAvailable { dropped })
            }
            1 => {
                let ranking = rankings.remove(0);
                if !dropped.is_empty() {
                    warn!(
                        source = %ranking.source,
                        dropped = dropped.len(),
                        "only one source available; skipping consensus"
                    );
                }
                Ok(CompareOutcome::SingleSource { ranking, dropped })
            }
            n => {
                let table = merge(&rankings, options)?;
                info!(sources = n, players = table.len(), "consensus built");
                Ok(CompareOutcome::Consensus { table, dropped })
            }
        }
    }

    fn fetch_resolved(
        &self,
        provider: Arc<dyn RankProvider>,
        scoring: ScoringMode,
        params: &FilterParams,
        cancel: &CancelToken,
    ) -> Result<Vec<draftlab_core::domain::CanonicalRecord>, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let key = CacheKey::new(provider.id(), scoring, params);
        let ttl = self.settings.ttl_for(provider.id().as_str());
        let timeout = self.settings.timeout;
        self.cache.get_or_fetch(&key, ttl, || {
            info!(source = %provider.id(), scoring = %scoring, "fetching rankings");
            fetch_with_timeout(Arc::clone(&provider), scoring, params, cancel, timeout)
        })
    }
}

impl fmt::Debug for RankSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankSession")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .finish()
    }
}
