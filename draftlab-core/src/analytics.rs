//! Draft analytics over a ranked list: tiers, positional rank and VORP.
//!
//! Works on anything implementing [`Ranked`], so a single source's records
//! and a consensus table are analyzed the same way.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusRow;
use crate::domain::{CanonicalRecord, Position, UnknownPosition};

/// Default replacement level for positions with no explicit entry.
pub const DEFAULT_REPLACEMENT_LEVEL: u32 = 12;

/// A row with a name, a position and a rank.
pub trait Ranked {
    fn player_name(&self) -> &str;
    fn position(&self) -> Position;
    fn rank_value(&self) -> f64;
}

impl Ranked for CanonicalRecord {
    fn player_name(&self) -> &str {
        CanonicalRecord::player_name(self)
    }

    fn position(&self) -> Position {
        CanonicalRecord::position(self)
    }

    fn rank_value(&self) -> f64 {
        f64::from(self.rank())
    }
}

impl Ranked for ConsensusRow {
    fn player_name(&self) -> &str {
        &self.player_name
    }

    fn position(&self) -> Position {
        self.position
    }

    fn rank_value(&self) -> f64 {
        self.consensus_rank
    }
}

/// Roster depth at which a position is considered replaceable.
///
/// Serialized as a table keyed by position name (`QB = 12`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, u32>", into = "BTreeMap<String, u32>")]
pub struct ReplacementLevels(BTreeMap<Position, u32>);

impl TryFrom<BTreeMap<String, u32>> for ReplacementLevels {
    type Error = UnknownPosition;

    fn try_from(raw: BTreeMap<String, u32>) -> Result<Self, Self::Error> {
        raw.into_iter()
            .map(|(pos, level)| Ok((Position::parse_loose(&pos)?, level)))
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

impl From<ReplacementLevels> for BTreeMap<String, u32> {
    fn from(levels: ReplacementLevels) -> Self {
        levels
            .0
            .into_iter()
            .map(|(pos, level)| (pos.as_str().to_string(), level))
            .collect()
    }
}

impl Default for ReplacementLevels {
    fn default() -> Self {
        Self(BTreeMap::from([
            (Position::QB, 12),
            (Position::RB, 24),
            (Position::WR, 24),
            (Position::TE, 12),
            (Position::K, 12),
            (Position::DST, 12),
        ]))
    }
}

impl ReplacementLevels {
    pub fn level(&self, position: Position) -> u32 {
        self.0
            .get(&position)
            .copied()
            .unwrap_or(DEFAULT_REPLACEMENT_LEVEL)
    }

    /// Override one position; zero is ignored.
    pub fn with(mut self, position: Position, level: u32) -> Self {
        if level > 0 {
            self.0.insert(position, level);
        }
        self
    }

    /// Merge user overrides on top of the defaults.
    pub fn overlay(mut self, overrides: &ReplacementLevels) -> Self {
        for (&pos, &level) in &overrides.0 {
            self = self.with(pos, level);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsOptions {
    /// Quantile of rank gaps that starts a new tier (lists longer than 5).
    pub gap_quantile: f64,
    pub replacement: ReplacementLevels,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            gap_quantile: 0.9,
            replacement: ReplacementLevels::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftInsight {
    pub player_name: String,
    pub position: Position,
    pub rank: f64,
    pub tier: u32,
    pub pos_rank: u32,
    pub vorp: f64,
}

/// Annotate `rows` (already in rank order) with tier, positional rank and VORP.
/// Output order matches input order.
pub fn analyze<T: Ranked>(rows: &[T], options: &AnalyticsOptions) -> Vec<DraftInsight> {
    let ranks: Vec<f64> = rows.iter().map(Ranked::rank_value).collect();
    let tiers = tiers(&ranks, options.gap_quantile);
    let pos_ranks = positional_ranks(rows);

    rows.iter()
        .zip(tiers)
        .zip(pos_ranks)
        .map(|((row, tier), pos_rank)| {
            let level = options.replacement.level(row.position());
            DraftInsight {
                player_name: row.player_name().to_string(),
                position: row.position(),
                rank: row.rank_value(),
                tier,
                pos_rank,
                vorp: vorp(pos_rank, level),
            }
        })
        .collect()
}

/// Tier numbers (from 1) for a rank sequence.
///
/// Gaps are successive rank differences with a leading zero. A new tier
/// starts at a gap that reaches the threshold (the `quantile` of all gaps
/// for lists longer than 5, otherwise mean plus sample std-dev) and is wider
/// than the narrowest positive gap. Evenly spaced ranks form a single tier.
pub fn tiers(ranks: &[f64], quantile: f64) -> Vec<u32> {
    if ranks.is_empty() {
        return Vec::new();
    }
    let gaps: Vec<f64> = std::iter::once(0.0)
        .chain(ranks.windows(2).map(|w| w[1] - w[0]))
        .collect();
    let threshold = if gaps.len() > 5 {
        quantile_linear(&gaps, quantile)
    } else {
        match sample_std(&gaps) {
            Some(std) => mean(&gaps) + std,
            None => return vec![1; ranks.len()],
        }
    };

    let narrowest = gaps
        .iter()
        .copied()
        .filter(|&g| g > 0.0)
        .fold(f64::INFINITY, f64::min);

    let mut tier = 1;
    gaps.iter()
        .map(|&gap| {
            if gap > narrowest && gap >= threshold {
                tier += 1;
            }
            tier
        })
        .collect()
}

/// Ordinal of each row within its position, by rank then input order.
pub fn positional_ranks<T: Ranked>(rows: &[T]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| rows[a].rank_value().total_cmp(&rows[b].rank_value()));

    let mut counts: HashMap<Position, u32> = HashMap::new();
    let mut out = vec![0; rows.len()];
    for i in order {
        let n = counts.entry(rows[i].position()).or_insert(0);
        *n += 1;
        out[i] = *n;
    }
    out
}

/// `1/pos_rank - 1/replacement_level`, rounded to 4 places.
pub fn vorp(pos_rank: u32, replacement_level: u32) -> f64 {
    let value = if pos_rank > 0 { 1.0 / f64::from(pos_rank) } else { 0.0 };
    let floor = 1.0 / f64::from(replacement_level.max(1));
    ((value - floor) * 10_000.0).round() / 10_000.0
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Quantile with linear interpolation between closest ranks.
fn quantile_linear(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
