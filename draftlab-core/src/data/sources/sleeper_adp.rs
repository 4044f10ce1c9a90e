//! Sleeper "trending adds" rankings from the public Sleeper API.
//!
//! Players are ordered by how many leagues added them over the lookback
//! window; the most-added player is rank 1. The list is format-agnostic, so
//! the scoring mode is ignored. The provider always ranks `universe_size`
//! players before filters are applied.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::data::cancel::CancelToken;
use crate::data::circuit_breaker::CircuitBreaker;
use crate::data::http::{HttpSettings, JsonClient};
use crate::data::normalize::{normalize, RawRow};
use crate::data::provider::{FetchError, FilterParams, RankProvider};
use crate::domain::{CanonicalRecord, ScoringMode, SourceId};

pub const SLEEPER_ADP_ID: &str = "sleeper-adp";
pub const SLEEPER_API_BASE: &str = "https://api.sleeper.app/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingEntry {
    pub player_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SleeperPlayer {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl SleeperPlayer {
    fn display_name(&self) -> String {
        if let Some(full) = self.full_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return full.to_string();
        }
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}")
    }
}

/// Join trending counts to the player directory, most-added first.
///
/// Ids missing from the directory are skipped. Equal counts keep API order.
pub fn trending_rows(
    mut trending: Vec<TrendingEntry>,
    players: &HashMap<String, SleeperPlayer>,
) -> Vec<RawRow> {
    trending.sort_by(|a, b| b.count.cmp(&a.count));
    trending
        .iter()
        .filter_map(|entry| players.get(&entry.player_id))
        .enumerate()
        .map(|(i, player)| RawRow {
            name: player.display_name(),
            position: player.position.clone().unwrap_or_default(),
            team: player.team.clone(),
            rank: Some(i as u32 + 1),
            ..RawRow::default()
        })
        .collect()
}

pub struct SleeperAdpProvider {
    id: SourceId,
    client: JsonClient,
    base_url: String,
    lookback_hours: u32,
    universe_size: usize,
}

impl SleeperAdpProvider {
    pub fn new(settings: HttpSettings) -> Result<Self, FetchError> {
        let breaker = Arc::new(CircuitBreaker::for_source(SLEEPER_ADP_ID));
        Ok(Self {
            id: SourceId::new(SLEEPER_ADP_ID),
            client: JsonClient::new(breaker, settings)?,
            base_url: SLEEPER_API_BASE.to_string(),
            lookback_hours: 168,
            universe_size: 300,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_universe_size(mut self, universe_size: usize) -> Self {
        self.universe_size = universe_size.max(1);
        self
    }

    fn trending_url(&self) -> String {
        format!(
            "{}/players/nfl/trending/add?lookback_hours={}&limit={}",
            self.base_url, self.lookback_hours, self.universe_size
        )
    }

    fn players_url(&self) -> String {
        format!("{}/players/nfl", self.base_url)
    }
}

impl RankProvider for SleeperAdpProvider {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn homepage(&self) -> &str {
        "https://sleeper.com/"
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
        let trending: Vec<TrendingEntry> = self.client.get_json(&self.trending_url(), cancel)?;
        if trending.is_empty() {
            return Err(FetchError::Empty {
                source_id: self.id.clone(),
            });
        }
        let players: HashMap<String, SleeperPlayer> =
            self.client.get_json(&self.players_url(), cancel)?;
        info!(
            source = %self.id,
            trending = trending.len(),
            directory = players.len(),
            "fetched sleeper trending adds"
        );
        self.rank_trending(scoring, trending, &players, params)
    }
}

impl SleeperAdpProvider {
    fn rank_trending(
        &self,
        scoring: ScoringMode,
        trending: Vec<TrendingEntry>,
        players: &HashMap<String, SleeperPlayer>,
        params: &FilterParams,
    ) -> Result<Vec<CanonicalRecord>, FetchError> {
        let ranked = normalize(&self.id, scoring, trending_rows(trending, players))?;
        params.narrow(&self.id, ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> HashMap<String, SleeperPlayer> {
        serde_json::from_str(
            r#"{
                "1111": {"first_name": "A", "last_name": "RB", "team": "AAA", "position": "RB"},
                "2222": {"full_name": "B WR", "team": "BBB", "position": "WR"},
                "KC": {"first_name": "Kansas City", "last_name": "Chiefs", "team": "KC", "position": "DEF"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn most_added_player_ranks_first() {
        let trending: Vec<TrendingEntry> = serde_json::from_str(
            r#"[{"player_id": "2222", "count": 90}, {"player_id": "1111", "count": 123}]"#,
        )
        .unwrap();
        let rows = trending_rows(trending, &directory());
        assert_eq!(rows[0].name, "A RB");
        assert_eq!(rows[0].rank, Some(1));
        assert_eq!(rows[1].name, "B WR");
        assert_eq!(rows[1].rank, Some(2));
    }

    #[test]
    fn unknown_ids_are_skipped_without_gaps() {
        let trending = vec![
            TrendingEntry { player_id: "9999".into(), count: 500 },
            TrendingEntry { player_id: "KC".into(), count: 10 },
        ];
        let rows = trending_rows(trending, &directory());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rank, Some(1));

        let records = normalize(&SourceId::new(SLEEPER_ADP_ID), ScoringMode::HalfPpr, rows).unwrap();
        assert_eq!(records[0].player_name(), "Kansas City Chiefs");
        assert_eq!(records[0].position(), crate::domain::Position::DST);
        assert_eq!(records[0].scoring(), ScoringMode::HalfPpr);
    }

    #[test]
    fn filter_leaving_nothing_is_an_error() {
        let provider = SleeperAdpProvider::new(HttpSettings::default()).unwrap();
        let trending = || {
            vec![
                TrendingEntry { player_id: "1111".into(), count: 40 },
                TrendingEntry { player_id: "2222".into(), count: 30 },
            ]
        };
        let flex = FilterParams::default()
            .with_positions(crate::data::provider::PositionFilter::only([crate::domain::Position::FLEX]));
        let err = provider
            .rank_trending(ScoringMode::Ppr, trending(), &directory(), &flex)
            .unwrap_err();
        assert!(matches!(err, FetchError::Empty { .. }));

        let zero = FilterParams::default().with_limit(0);
        let err = provider
            .rank_trending(ScoringMode::Ppr, trending(), &directory(), &zero)
            .unwrap_err();
        assert!(matches!(err, FetchError::Empty { .. }));

        let kept = provider
            .rank_trending(ScoringMode::Ppr, trending(), &directory(), &FilterParams::default())
            .unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = SleeperAdpProvider::new(HttpSettings::default())
            .unwrap()
            .with_base_url("http://localhost:9/v1/")
            .with_universe_size(25);
        assert_eq!(
            provider.trending_url(),
            "http://localhost:9/v1/players/nfl/trending/add?lookback_hours=168&limit=25"
        );
        assert_eq!(provider.players_url(), "http://localhost:9/v1/players/nfl");
    }
}
