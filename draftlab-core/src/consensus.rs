//! Consensus engine: merges two or more rankings into one table.
//!
//! Players are joined on [`PlayerKey`] (normalized name plus position). A
//! player's consensus rank is the mean of the ranks it received; sources that
//! lack the player contribute nothing under [`MissingRankPolicy::Skip`] and
//! `list length + 1` under [`MissingRankPolicy::Penalize`]. Rows are ordered
//! by consensus rank, then name, then position.
//!
//! Deltas are `rank(A) - rank(B)` for every pair of sources in caller order
//! where both ranked the player. A positive delta means B likes the player
//! more than A does.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::domain::{CanonicalRecord, PlayerKey, Position, ScoringMode, SourceId, SourcePair};

// ─── Inputs ──────────────────────────────────────────────────────────

/// One source's ranked output, as handed to [`merge`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRanking {
    pub source: SourceId,
    pub records: Vec<CanonicalRecord>,
}

impl SourceRanking {
    pub fn new(source: impl Into<SourceId>, records: Vec<CanonicalRecord>) -> Self {
        Self {
            source: source.into(),
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Scoring mode of the first record; `None` for an empty ranking.
    pub fn scoring(&self) -> Option<ScoringMode> {
        self.records.first().map(|r| r.scoring())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    /// Keep players ranked by any source.
    #[default]
    Union,
    /// Keep only players ranked by every source.
    Intersection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRankPolicy {
    /// Average over the sources that ranked the player.
    #[default]
    Skip,
    /// Count a missing source as `its list length + 1`.
    Penalize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct MergeOptions {
    pub join: JoinMode,
    pub missing: MissingRankPolicy,
}

impl MergeOptions {
    pub fn intersection() -> Self {
        Self {
            join: JoinMode::Intersection,
            ..Self::default()
        }
    }

    pub fn penalize_missing(mut self) -> Self {
        self.missing = MissingRankPolicy::Penalize;
        self
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error("consensus needs at least two non-empty sources, got {found}")]
    InsufficientSources { found: usize },

    #[error("source '{0}' supplied more than once")]
    DuplicateSource(SourceId),

    #[error("source '{source_id}' is scored {found} but '{first_source}' is scored {expected}")]
    ScoringMismatch {
        first_source: SourceId,
        expected: ScoringMode,
        source_id: SourceId,
        found: ScoringMode,
    },
}

// ─── Output ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusRow {
    pub player_name: String,
    pub position: Position,
    pub team: Option<String>,
    pub per_source_rank: BTreeMap<SourceId, u32>,
    pub consensus_rank: f64,
    /// 1-based place in the merged table.
    pub consensus_position: usize,
    #[serde(serialize_with = "serialize_deltas")]
    pub delta: BTreeMap<SourcePair, i64>,
}

impl ConsensusRow {
    pub fn rank_for(&self, source: &str) -> Option<u32> {
        self.per_source_rank.get(source).copied()
    }

    /// `rank(a) - rank(b)`, in either argument order; `None` unless both
    /// sources ranked the player.
    pub fn delta(&self, a: &str, b: &str) -> Option<i64> {
        let ra = self.rank_for(a)?;
        let rb = self.rank_for(b)?;
        Some(i64::from(ra) - i64::from(rb))
    }

    pub fn source_count(&self) -> usize {
        self.per_source_rank.len()
    }

    pub fn player_key(&self) -> PlayerKey {
        PlayerKey::new(&self.player_name, self.position)
    }
}

fn serialize_deltas<S: Serializer>(
    deltas: &BTreeMap<SourcePair, i64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
        deltas
            .iter()
            .map(|(pair, d)| (format!("{}|{}", pair.first, pair.second), *d)),
    )
}

/// Result of a merge: participating sources in caller order plus the rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusTable {
    sources: Vec<SourceId>,
    scoring: ScoringMode,
    rows: Vec<ConsensusRow>,
}

impl ConsensusTable {
    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    pub fn scoring(&self) -> ScoringMode {
        self.scoring
    }

    pub fn rows(&self) -> &[ConsensusRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ConsensusRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows ranked by both `a` and `b`, ordered by `|rank(a) - rank(b)|`
    /// descending, ties by consensus position.
    pub fn biggest_differences(&self, a: &str, b: &str) -> Vec<(&ConsensusRow, i64)> {
        let mut out: Vec<(&ConsensusRow, i64)> = self
            .rows
            .iter()
            .filter_map(|row| row.delta(a, b).map(|d| (row, d)))
            .collect();
        out.sort_by(|(ra, da), (rb, db)| {
            db.abs()
                .cmp(&da.abs())
                .then(ra.consensus_position.cmp(&rb.consensus_position))
        });
        out
    }

    /// Trim to the first `n` rows, for display.
    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }
}

// ─── Merge ───────────────────────────────────────────────────────────

struct Joined {
    player_name: String,
    position: Position,
    team: Option<String>,
    ranks: BTreeMap<SourceId, u32>,
}

/// Merge rankings from two or more sources into a consensus table.
pub fn merge(
    results: &[SourceRanking],
    options: &MergeOptions,
) -> Result<ConsensusTable, AggregationError> {
    let mut seen: HashSet<&SourceId> = HashSet::with_capacity(results.len());
    for r in results {
        if !seen.insert(&r.source) {
            return Err(AggregationError::DuplicateSource(r.source.clone()));
        }
    }

    let usable: Vec<&SourceRanking> = results.iter().filter(|r| !r.is_empty()).collect();
    for skipped in results.iter().filter(|r| r.is_empty()) {
        debug!(source = %skipped.source, "skipping empty ranking");
    }
    if usable.len() < 2 {
        return Err(AggregationError::InsufficientSources {
            found: usable.len(),
        });
    }

    let scoring = check_scoring(&usable)?;

    let mut joined: HashMap<PlayerKey, Joined> = HashMap::new();
    for ranking in &usable {
        for record in &ranking.records {
            let entry = joined.entry(record.player_key()).or_insert_with(|| Joined {
                player_name: record.player_name().to_string(),
                position: record.position(),
                team: None,
                ranks: BTreeMap::new(),
            });
            if entry.team.is_none() {
                entry.team = record.team().map(str::to_string);
            }
            // A repeated key within one source keeps its first (better) rank.
            entry
                .ranks
                .entry(ranking.source.clone())
                .or_insert(record.rank());
        }
    }

    let source_total = usable.len();
    let mut rows: Vec<ConsensusRow> = joined
        .into_values()
        .filter(|j| options.join == JoinMode::Union || j.ranks.len() == source_total)
        .map(|j| {
            let consensus_rank = consensus_rank(&j.ranks, &usable, options.missing);
            let delta = pair_deltas(&j.ranks, &usable);
            ConsensusRow {
                player_name: j.player_name,
                position: j.position,
                team: j.team,
                per_source_rank: j.ranks,
                consensus_rank,
                consensus_position: 0,
                delta,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        a.consensus_rank
            .total_cmp(&b.consensus_rank)
            .then_with(|| a.player_name.cmp(&b.player_name))
            .then_with(|| a.position.cmp(&b.position))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.consensus_position = i + 1;
    }

    Ok(ConsensusTable {
        sources: usable.iter().map(|r| r.source.clone()).collect(),
        scoring,
        rows,
    })
}

fn check_scoring(usable: &[&SourceRanking]) -> Result<ScoringMode, AggregationError> {
    let first = usable[0];
    let expected = first.records[0].scoring();
    for ranking in usable {
        if let Some(bad) = ranking.records.iter().find(|r| r.scoring() != expected) {
            return Err(AggregationError::ScoringMismatch {
                first_source: first.source.clone(),
                expected,
                source_id: ranking.source.clone(),
                found: bad.scoring(),
            });
        }
    }
    Ok(expected)
}

fn consensus_rank(
    ranks: &BTreeMap<SourceId, u32>,
    usable: &[&SourceRanking],
    policy: MissingRankPolicy,
) -> f64 {
    match policy {
        MissingRankPolicy::Skip => {
            let sum: f64 = ranks.values().map(|&r| f64::from(r)).sum();
            sum / ranks.len() as f64
        }
        MissingRankPolicy::Penalize => {
            let sum: f64 = usable
                .iter()
                .map(|s| match ranks.get(&s.source) {
                    Some(&r) => f64::from(r),
                    None => (s.len() + 1) as f64,
                })
                .sum();
            sum / usable.len() as f64
        }
    }
}

fn pair_deltas(
    ranks: &BTreeMap<SourceId, u32>,
    usable: &[&SourceRanking],
) -> BTreeMap<SourcePair, i64> {
    let mut deltas = BTreeMap::new();
    for (i, a) in usable.iter().enumerate() {
        let Some(&ra) = ranks.get(&a.source) else {
            continue;
        };
        for b in &usable[i + 1..] {
            if let Some(&rb) = ranks.get(&b.source) {
                deltas.insert(
                    SourcePair::new(a.source.clone(), b.source.clone()),
                    i64::from(ra) - i64::from(rb),
                );
            }
        }
    }
    deltas
}
