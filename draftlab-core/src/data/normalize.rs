//! Normalization of loosely-structured source rows into canonical records.
//!
//! Steps:
//! - clean text and parse positions, skipping rows that cannot be identified
//! - pick a rank basis (explicit rank, ascending ADP, or source order)
//! - stable sort, bumping tied ranks so they stay strictly increasing
//! - drop repeated players, keeping the better-ranked row

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::FetchError;
use crate::domain::{CanonicalRecord, PlayerKey, Position, ScoringMode, SourceId};

/// One row as a source publishes it, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(alias = "player")]
    pub name: String,
    #[serde(rename = "pos", alias = "position")]
    pub position: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub rank: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub adp: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub bye: Option<u8>,
}

impl RawRow {
    pub fn ranked(rank: u32, name: &str, team: &str, position: &str) -> Self {
        Self {
            name: name.to_string(),
            position: position.to_string(),
            team: Some(team.to_string()),
            rank: Some(rank),
            ..Self::default()
        }
    }

    pub fn with_bye(mut self, bye: u8) -> Self {
        self.bye = Some(bye);
        self
    }

    pub fn with_adp(mut self, adp: f64) -> Self {
        self.adp = Some(adp);
        self
    }
}

/// How provisional ranks were derived for a batch of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBasis {
    /// Every row carried its own rank.
    Explicit,
    /// Rows ranked by ascending ADP; rows without ADP follow in source order.
    Adp,
    /// Rows ranked by the order the source listed them.
    SourceOrder,
}

struct Candidate {
    row: RawRow,
    position: Position,
    provisional: u32,
}

/// Normalize raw rows from `source` into records ordered by strictly
/// increasing rank with unique player keys.
///
/// Fails with `FetchError::Empty` when no row survives.
pub fn normalize(
    source: &SourceId,
    scoring: ScoringMode,
    rows: Vec<RawRow>,
) -> Result<Vec<CanonicalRecord>, FetchError> {
    let total = rows.len();
    let mut candidates: Vec<Candidate> = Vec::with_capacity(total);
    for row in rows {
        if row.name.trim().is_empty() {
            debug!(source = %source, "skipping row without a player name");
            continue;
        }
        match Position::parse_loose(&row.position) {
            Ok(position) => candidates.push(Candidate {
                row,
                position,
                provisional: 0,
            }),
            Err(e) => debug!(source = %source, player = %row.name, "skipping row: {e}"),
        }
    }

    let basis = rank_basis(&candidates);
    assign_provisional_ranks(&mut candidates, basis);
    // Stable: equal provisional ranks keep source order.
    candidates.sort_by_key(|c| c.provisional);

    let mut seen: HashSet<PlayerKey> = HashSet::with_capacity(candidates.len());
    let mut records = Vec::with_capacity(candidates.len());
    let mut prev_rank = 0u32;
    for c in candidates {
        let Some(next) = prev_rank.checked_add(1) else {
            debug!(source = %source, player = %c.row.name, "skipping row: rank out of range");
            continue;
        };
        let rank = c.provisional.max(next);
        let record = match CanonicalRecord::new(&c.row.name, c.position, rank, source.clone(), scoring)
        {
            Ok(r) => r
                .with_team(c.row.team.as_deref())
                .with_bye_week(c.row.bye),
            Err(e) => {
                debug!(source = %source, "skipping row: {e}");
                continue;
            }
        };
        if !seen.insert(record.player_key()) {
            debug!(source = %source, player = %record.player_name(), "dropping repeated player");
            continue;
        }
        prev_rank = rank;
        records.push(record);
    }

    if records.is_empty() {
        return Err(FetchError::Empty {
            source_id: source.clone(),
        });
    }
    debug!(
        source = %source,
        rows = total,
        kept = records.len(),
        basis = ?basis,
        "normalized rankings"
    );
    Ok(records)
}

fn rank_basis(candidates: &[Candidate]) -> RankBasis {
    if candidates.iter().all(|c| c.row.rank.is_some_and(|r| r > 0)) {
        RankBasis::Explicit
    } else if candidates.iter().any(|c| valid_adp(c.row.adp).is_some()) {
        RankBasis::Adp
    } else {
        RankBasis::SourceOrder
    }
}

fn valid_adp(adp: Option<f64>) -> Option<f64> {
    adp.filter(|a| a.is_finite() && *a > 0.0)
}

fn assign_provisional_ranks(candidates: &mut [Candidate], basis: RankBasis) {
    match basis {
        RankBasis::Explicit => {
            for c in candidates.iter_mut() {
                c.provisional = c.row.rank.unwrap_or(u32::MAX);
            }
        }
        RankBasis::SourceOrder => {
            for (i, c) in candidates.iter_mut().enumerate() {
                c.provisional = i as u32 + 1;
            }
        }
        RankBasis::Adp => {
            let mut order: Vec<usize> = (0..candidates.len()).collect();
            order.sort_by(|&a, &b| {
                match (valid_adp(candidates[a].row.adp), valid_adp(candidates[b].row.adp)) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
            for (rank, idx) in order.into_iter().enumerate() {
                candidates[idx].provisional = rank as u32 + 1;
            }
        }
    }
}
