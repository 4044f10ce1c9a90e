use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use super::position::Position;

/// Identifier of the provider that produced a ranking (e.g. `espn-editorial`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Normalized player identity used to join rankings across sources.
///
/// Two records refer to the same player when their names match after
/// lower-casing and whitespace collapsing AND they share a position. Players
/// with identical names at the same position collide; that is accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerKey {
    pub name: String,
    pub position: Position,
}

impl PlayerKey {
    pub fn new(name: &str, position: Position) -> Self {
        Self {
            name: normalize_name(name),
            position,
        }
    }
}

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.name, self.position)
    }
}

/// Ordered pair of sources; deltas are always `rank(first) - rank(second)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePair {
    pub first: SourceId,
    pub second: SourceId,
}

impl SourcePair {
    pub fn new(first: impl Into<SourceId>, second: impl Into<SourceId>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn swapped(&self) -> Self {
        Self {
            first: self.second.clone(),
            second: self.first.clone(),
        }
    }
}

impl fmt::Display for SourcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.first, self.second)
    }
}

/// Collapse runs of whitespace (including non-breaking spaces) to one space and trim.
pub fn clean_text(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lower-cased, whitespace-collapsed form of a player name.
pub fn normalize_name(raw: &str) -> String {
    clean_text(raw).to_lowercase()
}
