use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::provider::FilterParams;
use crate::domain::{ScoringMode, SourceId};

/// Bumped whenever the cached payload layout changes, so old entries miss.
const KEY_VERSION: &str = "v1";

/// Deterministic cache key for one (source, scoring, filters) request.
///
/// Every parameter that changes a provider's output is part of the key, so
/// a narrower earlier fetch can never answer a broader request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    source: SourceId,
    text: String,
}

impl CacheKey {
    pub fn new(source: &SourceId, scoring: ScoringMode, params: &FilterParams) -> Self {
        let limit = params
            .limit
            .map_or_else(|| "all".to_string(), |l| l.to_string());
        let text = format!(
            "{KEY_VERSION}::{source}::{scoring}::limit={limit}::pos={}",
            params.positions.key_fragment()
        );
        Self {
            source: source.clone(),
            text,
        }
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// BLAKE3 hex digest of the key text, safe to use as a file name.
    pub fn digest(&self) -> String {
        digest_key(&self.text)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub(crate) fn digest_key(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}
