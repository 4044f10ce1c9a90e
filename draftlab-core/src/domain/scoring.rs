use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// League scoring format a ranking was produced for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    Standard,
    HalfPpr,
    #[default]
    Ppr,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scoring mode '{0}' (expected standard, half or ppr)")]
pub struct UnknownScoringMode(pub String);

impl ScoringMode {
    pub const ALL: [ScoringMode; 3] = [ScoringMode::Standard, ScoringMode::HalfPpr, ScoringMode::Ppr];

    /// Stable lower-case label, used in cache keys and file path templates.
    pub fn as_str(self) -> &'static str {
        match self {
            ScoringMode::Standard => "standard",
            ScoringMode::HalfPpr => "half",
            ScoringMode::Ppr => "ppr",
        }
    }
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringMode {
    type Err = UnknownScoringMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "standard" | "std" | "non-ppr" => Ok(ScoringMode::Standard),
            "half" | "half-ppr" | "0.5" => Ok(ScoringMode::HalfPpr),
            "ppr" | "full-ppr" => Ok(ScoringMode::Ppr),
            _ => Err(UnknownScoringMode(s.to_string())),
        }
    }
}
