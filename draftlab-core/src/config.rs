//! TOML configuration.
//!
//! Resolution order for the default TTL: `DRAFTLAB_CACHE_TTL_SECONDS` →
//! `[cache] default_ttl_secs` → 3600. Every section is optional.
//!
//! ```toml
//! [cache]
//! default_ttl_secs = 3600
//! stale_if_error = false
//!
//! [fetch]
//! timeout_secs = 30
//!
//! [sources.sleeper-adp]
//! ttl_secs = 1800
//!
//! [[csv_sources]]
//! id = "my-sheet"
//! path = "ranks/{scoring}.csv"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::analytics::{AnalyticsOptions, ReplacementLevels};
use crate::data::cache::CachePolicy;
use crate::data::http::HttpSettings;
use crate::data::sources::{ESPN_EDITORIAL_ID, SLEEPER_ADP_ID};

pub const CACHE_TTL_ENV: &str = "DRAFTLAB_CACHE_TTL_SECONDS";
pub const DEFAULT_TTL_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Directory for cache files; the CLI falls back to the OS cache dir.
    pub dir: Option<PathBuf>,
    pub default_ttl_secs: u64,
    pub stale_if_error: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: None,
            default_ttl_secs: DEFAULT_TTL_SECS,
            stale_if_error: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    /// Upper bound on one provider call, retries included.
    pub timeout_secs: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            request_timeout_secs: 20,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOverride {
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvSourceConfig {
    pub id: String,
    /// Path to the sheet; may contain `{scoring}`.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSection {
    pub gap_quantile: f64,
    /// Overrides merged on top of the default replacement levels.
    pub replacement: ReplacementLevels,
}

impl Default for AnalyticsSection {
    fn default() -> Self {
        let defaults = AnalyticsOptions::default();
        Self {
            gap_quantile: defaults.gap_quantile,
            replacement: defaults.replacement,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftlabConfig {
    pub cache: CacheSection,
    pub fetch: FetchSection,
    pub sources: BTreeMap<String, SourceOverride>,
    pub csv_sources: Vec<CsvSourceConfig>,
    pub analytics: AnalyticsSection,
}

impl DraftlabConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise defaults; then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let Some(raw) = lookup(CACHE_TTL_ENV) else {
            return;
        };
        match parse_ttl(&raw) {
            Some(secs) => self.cache.default_ttl_secs = secs,
            None => warn!(value = %raw, "ignoring invalid {CACHE_TTL_ENV}"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.analytics.gap_quantile) {
            return Err(ConfigError::Invalid(format!(
                "analytics.gap_quantile must be within 0..=1, got {}",
                self.analytics.gap_quantile
            )));
        }
        let mut ids = HashSet::new();
        for csv in &self.csv_sources {
            let id = csv.id.trim();
            if id.is_empty() {
                return Err(ConfigError::Invalid("csv source with empty id".into()));
            }
            if id == ESPN_EDITORIAL_ID || id == SLEEPER_ADP_ID {
                return Err(ConfigError::Invalid(format!(
                    "csv source '{id}' shadows a built-in source"
                )));
            }
            if !ids.insert(id) {
                return Err(ConfigError::Invalid(format!("csv source '{id}' listed twice")));
            }
            if csv.path.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("csv source '{id}' has no path")));
            }
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.default_ttl_secs)
    }

    /// TTL for `source_id`: its override if configured, else the default.
    pub fn ttl_for(&self, source_id: &str) -> Duration {
        self.sources
            .get(source_id)
            .and_then(|o| o.ttl_secs)
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.default_ttl())
    }

    pub fn ttl_overrides(&self) -> BTreeMap<String, Duration> {
        self.sources
            .iter()
            .filter_map(|(id, o)| o.ttl_secs.map(|s| (id.clone(), Duration::from_secs(s))))
            .collect()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.fetch.request_timeout_secs.max(1)),
            max_retries: self.fetch.max_retries,
            ..HttpSettings::default()
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            stale_if_error: self.cache.stale_if_error,
        }
    }

    pub fn analytics_options(&self) -> AnalyticsOptions {
        AnalyticsOptions {
            gap_quantile: self.analytics.gap_quantile,
            replacement: ReplacementLevels::default().overlay(&self.analytics.replacement),
        }
    }
}

/// Integer seconds; negatives clamp to zero, anything else is rejected.
fn parse_ttl(raw: &str) -> Option<u64> {
    let value: i64 = raw.trim().parse().ok()?;
    Some(value.max(0) as u64)
}
