//! Local ranking sheets in CSV form.
//!
//! Expected headers (case-insensitive, any order): `name` (or `player`),
//! `pos` (or `position`), and optionally `team`, `rank`, `adp`, `bye`.
//! A `{scoring}` placeholder in the path selects one sheet per scoring mode.

use std::path::PathBuf;

use crate::data::cancel::CancelToken;
use crate::data::normalize::{normalize, RawRow};
use crate::data::provider::{FetchError, FilterParams, RankProvider};
use crate::domain::{CanonicalRecord, ScoringMode, SourceId};

pub const SCORING_PLACEHOLDER: &str = "{scoring}";

#[derive(Debug, Clone)]
pub struct CsvSheetProvider {
    id: SourceId,
    path_template: String,
    homepage: String,
}

impl CsvSheetProvider {
    pub fn new(id: impl Into<SourceId>, path_template: impl Into<String>) -> Self {
        let path_template = path_template.into();
        Self {
            id: id.into(),
            homepage: format!("file://{path_template}"),
            path_template,
        }
    }

    pub fn path_for(&self, scoring: ScoringMode) -> PathBuf {
        PathBuf::from(
            self.path_template
                .replace(SCORING_PLACEHOLDER, scoring.as_str()),
        )
    }

    fn read_rows(&self, scoring: ScoringMode) -> Result<Vec<RawRow>, FetchError> {
        let path = self.path_for(scoring);
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| FetchError::Io(format!("{}: {e}", path.display())))?;

        let headers: csv::StringRecord = reader
            .headers()
            .map_err(|e| FetchError::ResponseFormatChanged(format!("{}: {e}", path.display())))?
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();
        reader.set_headers(headers);

        reader
            .deserialize::<RawRow>()
            .enumerate()
            .map(|(i, row)| {
                row.map_err(|e| {
                    FetchError::ResponseFormatChanged(format!(
                        "{} row {}: {e}",
                        path.display(),
                        i + 2
                    ))
                })
            })
            .collect()
    }
}

impl RankProvider for CsvSheetProvider {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn homepage(&self) -> &str {
        &self.homepage
    }

    fn honors_scoring(&self) -> bool {
        self.path_template.contains(SCORING_PLACEHOLDER)
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
        let rows = self.read_rows(scoring)?;
        let ranked = normalize(&self.id, scoring, rows)?;
        params.narrow(&self.id, ranked)
    }
}
