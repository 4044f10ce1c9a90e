//! The canonical player-rank record every provider produces.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{clean_text, PlayerKey, SourceId};
use super::position::Position;
use super::scoring::ScoringMode;

/// Highest bye week in a regular season.
pub const MAX_BYE_WEEK: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("player name is empty")]
    EmptyName,

    #[error("rank must be positive (player '{player}')")]
    ZeroRank { player: String },
}

/// One player's ranking from one source, for one scoring mode.
///
/// Records are immutable once built: fields are private and only readable.
/// `team` and `bye_week` are attached during construction with the
/// consuming `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    player_name: String,
    position: Position,
    team: Option<String>,
    rank: u32,
    bye_week: Option<u8>,
    source_id: SourceId,
    scoring: ScoringMode,
}

impl CanonicalRecord {
    pub fn new(
        player_name: &str,
        position: Position,
        rank: u32,
        source_id: SourceId,
        scoring: ScoringMode,
    ) -> Result<Self, RecordError> {
        let player_name = clean_text(player_name);
        if player_name.is_empty() {
            return Err(RecordError::EmptyName);
        }
        if rank == 0 {
            return Err(RecordError::ZeroRank {
                player: player_name,
            });
        }
        Ok(Self {
            player_name,
            position,
            team: None,
            rank,
            bye_week: None,
            source_id,
            scoring,
        })
    }

    /// Attach a team code. Blank codes leave the team unknown.
    pub fn with_team(mut self, team: Option<&str>) -> Self {
        self.team = team
            .map(|t| clean_text(t).to_ascii_uppercase())
            .filter(|t| !t.is_empty());
        self
    }

    /// Attach a bye week. Weeks outside 1..=18 are discarded.
    pub fn with_bye_week(mut self, bye: Option<u8>) -> Self {
        self.bye_week = bye.filter(|w| (1..=MAX_BYE_WEEK).contains(w));
        self
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn team(&self) -> Option<&str> {
        self.team.as_deref()
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn bye_week(&self) -> Option<u8> {
        self.bye_week
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub fn scoring(&self) -> ScoringMode {
        self.scoring
    }

    pub fn player_key(&self) -> PlayerKey {
        PlayerKey::new(&self.player_name, self.position)
    }
}
