//! ESPN editorial rankings, served from a built-in snapshot.
//!
//! The editorial board publishes one overall list; the scoring mode is
//! accepted and stamped on records but does not change the order.

use crate::data::cancel::CancelToken;
use crate::data::normalize::{normalize, RawRow};
use crate::data::provider::{FetchError, FilterParams, RankProvider};
use crate::domain::{CanonicalRecord, ScoringMode, SourceId};

pub const ESPN_EDITORIAL_ID: &str = "espn-editorial";

/// (rank, player, team, position, bye week)
const SNAPSHOT: &[(u32, &str, &str, &str, u8)] = &[
    (1, "Christian McCaffrey", "SF", "RB", 9),
    (2, "CeeDee Lamb", "DAL", "WR", 7),
    (3, "Tyreek Hill", "MIA", "WR", 6),
    (4, "Ja'Marr Chase", "CIN", "WR", 12),
    (5, "Justin Jefferson", "MIN", "WR", 6),
    (6, "Amon-Ra St. Brown", "DET", "WR", 5),
    (7, "Bijan Robinson", "ATL", "RB", 12),
    (8, "Breece Hall", "NYJ", "RB", 12),
    (9, "A.J. Brown", "PHI", "WR", 5),
    (10, "Garrett Wilson", "NYJ", "WR", 12),
    (11, "Puka Nacua", "LAR", "WR", 6),
    (12, "Jonathan Taylor", "IND", "RB", 14),
    (13, "Saquon Barkley", "PHI", "RB", 5),
    (14, "Marvin Harrison Jr.", "ARI", "WR", 11),
    (15, "Jahmyr Gibbs", "DET", "RB", 5),
    (16, "Davante Adams", "LV", "WR", 10),
    (17, "Chris Olave", "NO", "WR", 12),
    (18, "Drake London", "ATL", "WR", 12),
    (19, "Travis Kelce", "KC", "TE", 6),
    (20, "Sam LaPorta", "DET", "TE", 5),
    (21, "Josh Allen", "BUF", "QB", 12),
    (22, "Jalen Hurts", "PHI", "QB", 5),
    (23, "Kyren Williams", "LAR", "RB", 6),
    (24, "De'Von Achane", "MIA", "RB", 6),
    (25, "Lamar Jackson", "BAL", "QB", 14),
    (26, "Mark Andrews", "BAL", "TE", 14),
    (27, "Patrick Mahomes", "KC", "QB", 6),
    (28, "Trey McBride", "ARI", "TE", 11),
    (29, "San Francisco 49ers", "SF", "D/ST", 9),
    (30, "Justin Tucker", "BAL", "K", 14),
];

#[derive(Debug, Clone)]
pub struct EspnEditorialProvider {
    id: SourceId,
}

impl EspnEditorialProvider {
    pub fn new() -> Self {
        Self {
            id: SourceId::new(ESPN_EDITORIAL_ID),
        }
    }

    fn snapshot_rows() -> Vec<RawRow> {
        SNAPSHOT
            .iter()
            .map(|&(rank, name, team, pos, bye)| RawRow::ranked(rank, name, team, pos).with_bye(bye))
            .collect()
    }
}

impl Default for EspnEditorialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RankProvider for EspnEditorialProvider {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn homepage(&self) -> &str {
        "https://www.espn.com/fantasy/football/"
    }

    fn honors_scoring(&self) -> bool {
        false
    }

    fn fetch(
        &self,
        scoring: ScoringMode,
        params: &FilterParams,
        cancel: &CancelToken,
    ) -> Result<Vec<CanonicalRecord>, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let ranked = normalize(&self.id, scoring, Self::snapshot_rows())?;
        params.narrow(&self.id, ranked)
    }
}
