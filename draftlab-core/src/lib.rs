//! DraftLab Core: ranking providers, normalization, cache layer and consensus.
//!
//! This crate contains the aggregation pipeline:
//! - Domain types (canonical records, positions, scoring modes, ids)
//! - Provider trait plus the built-in editorial, Sleeper and CSV sources
//! - Normalization of loose source rows into strictly ranked records
//! - Time-bounded, single-flight cache in front of every provider
//! - Consensus merge with pairwise rank deltas
//! - Draft analytics (tiers, positional rank, VORP) and TOML configuration

pub mod analytics;
pub mod config;
pub mod consensus;
pub mod data;
pub mod domain;
pub mod registry;

pub use analytics::{analyze, AnalyticsOptions, DraftInsight, Ranked, ReplacementLevels};
pub use config::{ConfigError, DraftlabConfig};
pub use consensus::{
    merge, AggregationError, ConsensusRow, ConsensusTable, JoinMode, MergeOptions,
    MissingRankPolicy, SourceRanking,
};
pub use registry::{ProviderRegistry, SourceInfo, SourceKind, UnknownSourceError};
