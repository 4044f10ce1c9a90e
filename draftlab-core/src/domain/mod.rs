//! Domain types: positions, scoring modes, identities and the canonical record.

pub mod ids;
pub mod position;
pub mod record;
pub mod scoring;

pub use ids::{clean_text, normalize_name, PlayerKey, SourceId, SourcePair};
pub use position::{Position, UnknownPosition};
pub use record::{CanonicalRecord, RecordError, MAX_BYE_WEEK};
pub use scoring::{ScoringMode, UnknownScoringMode};
