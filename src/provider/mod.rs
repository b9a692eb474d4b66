pub mod http;

#[cfg(test)]
pub mod fake;

pub use http::HttpProvider;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::errors::SyncError;

/// Raw answer from the conditional poll endpoint.
///
/// Any HTTP status is carried here; classification happens in the fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResponse {
    pub status: u16,
    /// Entity tag returned with the response, if any
    pub validator: Option<String>,
    pub body: Option<Value>,
}

/// Trait that every game-data provider must implement.
#[async_trait]
pub trait GameDataProvider: Send + Sync {
    /// Today's scoreboard document (`{scoreboard: {gameDate, games: [...]}}`).
    async fn scoreboard_today(&self) -> Result<Value, SyncError>;

    /// Game identifiers scheduled on the given date.
    async fn game_ids_for_date(&self, date: NaiveDate) -> Result<Vec<String>, SyncError>;

    /// Full-resolution boxscore document (`{game: {...}}`).
    async fn boxscore(&self, game_id: &str) -> Result<Value, SyncError>;

    /// Full-resolution play-by-play document (`{game: {actions: [...]}}`).
    async fn play_by_play(&self, game_id: &str) -> Result<Value, SyncError>;

    /// Conditional slim poll. Only transport failures are `Err`.
    async fn poll_game(
        &self,
        game_id: &str,
        validator: Option<&str>,
    ) -> Result<PollResponse, SyncError>;

    fn assets(&self) -> &AssetUrls;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Resolves team logos and player headshots to the provider's redirect routes.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetUrls {
    base: String,
}

impl AssetUrls {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let parsed = url::Url::parse(base_url)?;
        Ok(AssetUrls {
            base: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn team_logo(&self, team_id: i64) -> String {
        format!("{}/assets/team-logo/{}", self.base, team_id)
    }

    pub fn player_headshot(&self, player_id: i64) -> String {
        format!("{}/assets/player-headshot/{}", self.base, player_id)
    }
}
