//! Provider registry: maps source ids to concrete providers.
//!
//! Source kinds are a closed set ([`SourceKind`]); each registered id carries
//! its kind alongside the provider so callers can describe what they run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::http::HttpSettings;
use crate::data::provider::{FetchError, RankProvider};
use crate::data::sources::{CsvSheetProvider, EspnEditorialProvider, SleeperAdpProvider};
use crate::domain::SourceId;

// ─── Error types ─────────────────────────────────────────────────────

/// Raised when a caller names a source nobody registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown source '{id}' (known: {})", join_ids(.known))]
pub struct UnknownSourceError {
    pub id: String,
    pub known: Vec<SourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("source '{0}' is already registered")]
pub struct DuplicateSourceError(pub SourceId);

fn join_ids(ids: &[SourceId]) -> String {
    ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
}

// ─── Kinds ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    EspnEditorial,
    SleeperAdp,
    Csv,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::EspnEditorial => "espn_editorial",
            SourceKind::SleeperAdp => "sleeper_adp",
            SourceKind::Csv => "csv",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one registered source, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub id: SourceId,
    pub kind: SourceKind,
    pub homepage: String,
    pub honors_scoring: bool,
}

// ─── Registry ────────────────────────────────────────────────────────

struct Registered {
    kind: SourceKind,
    provider: Arc<dyn RankProvider>,
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<SourceId, Registered>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in editorial and Sleeper providers.
    pub fn with_builtin(http: HttpSettings) -> Result<Self, FetchError> {
        let mut registry = Self::new();
        let espn: Arc<dyn RankProvider> = Arc::new(EspnEditorialProvider::new());
        let sleeper: Arc<dyn RankProvider> = Arc::new(SleeperAdpProvider::new(http)?);
        for (kind, provider) in [
            (SourceKind::EspnEditorial, espn),
            (SourceKind::SleeperAdp, sleeper),
        ] {
            registry
                .register(kind, provider)
                .map_err(|e| FetchError::Other(e.to_string()))?;
        }
        Ok(registry)
    }

    pub fn register(
        &mut self,
        kind: SourceKind,
        provider: Arc<dyn RankProvider>,
    ) -> Result<(), DuplicateSourceError> {
        let id = provider.id().clone();
        if self.providers.contains_key(&id) {
            return Err(DuplicateSourceError(id));
        }
        self.providers.insert(id, Registered { kind, provider });
        Ok(())
    }

    /// Register a local CSV sheet under `id`.
    pub fn register_csv(
        &mut self,
        id: impl Into<SourceId>,
        path_template: impl Into<String>,
    ) -> Result<(), DuplicateSourceError> {
        let provider = CsvSheetProvider::new(id, path_template);
        self.register(SourceKind::Csv, Arc::new(provider))
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<dyn RankProvider>, UnknownSourceError> {
        self.providers
            .get(id)
            .map(|r| Arc::clone(&r.provider))
            .ok_or_else(|| UnknownSourceError {
                id: id.to_string(),
                known: self.ids(),
            })
    }

    pub fn kind(&self, id: &str) -> Option<SourceKind> {
        self.providers.get(id).map(|r| r.kind)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    pub fn ids(&self) -> Vec<SourceId> {
        self.providers.keys().cloned().collect()
    }

    pub fn describe(&self) -> Vec<SourceInfo> {
        self.providers
            .iter()
            .map(|(id, r)| SourceInfo {
                id: id.clone(),
                kind: r.kind,
                homepage: r.provider.homepage().to_string(),
                honors_scoring: r.provider.honors_scoring(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.providers.iter().map(|(id, r)| (id.as_str(), r.kind)))
            .finish()
    }
}
