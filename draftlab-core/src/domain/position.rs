use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Roster position a player is ranked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    QB,
    RB,
    WR,
    TE,
    K,
    DST,
    FLEX,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown position: '{0}'")]
pub struct UnknownPosition(pub String);

impl Position {
    pub const ALL: [Position; 7] = [
        Position::QB,
        Position::RB,
        Position::WR,
        Position::TE,
        Position::K,
        Position::DST,
        Position::FLEX,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Position::QB => "QB",
            Position::RB => "RB",
            Position::WR => "WR",
            Position::TE => "TE",
            Position::K => "K",
            Position::DST => "DST",
            Position::FLEX => "FLEX",
        }
    }

    /// Parse the loose position labels sources use.
    ///
    /// Defense labels (`D/ST`, `DEF`, `D`) map to DST and `PK` to K. Compound
    /// labels such as `WR/TE` or `RB,WR` resolve to their first segment.
    pub fn parse_loose(raw: &str) -> Result<Self, UnknownPosition> {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.as_str() {
            "D/ST" | "DST" | "DEF" | "D" | "DEFENSE" => return Ok(Position::DST),
            "PK" => return Ok(Position::K),
            _ => {}
        }
        let first = upper
            .split(['/', ',', ' '])
            .find(|s| !s.is_empty())
            .unwrap_or("");
        match first {
            "QB" => Ok(Position::QB),
            "RB" => Ok(Position::RB),
            "WR" => Ok(Position::WR),
            "TE" => Ok(Position::TE),
            "K" | "PK" => Ok(Position::K),
            "DST" | "DEF" => Ok(Position::DST),
            "FLEX" => Ok(Position::FLEX),
            _ => Err(UnknownPosition(raw.to_string())),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = UnknownPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_loose(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defense_aliases() {
        for label in ["D/ST", "dst", "DEF", "d"] {
            assert_eq!(Position::parse_loose(label).unwrap(), Position::DST, "{label}");
        }
    }

    #[test]
    fn compound_label_takes_first_segment() {
        assert_eq!(Position::parse_loose("WR/TE").unwrap(), Position::WR);
        assert_eq!(Position::parse_loose(" rb ").unwrap(), Position::RB);
    }

    #[test]
    fn rejects_unknown_labels() {
        assert!(Position::parse_loose("LB").is_err());
        assert!(Position::parse_loose("").is_err());
    }
}
