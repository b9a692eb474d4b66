//! In-memory provider for tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{AssetUrls, GameDataProvider, PollResponse};
use crate::errors::SyncError;

pub struct FakeProvider {
    pub scoreboard: Option<Value>,
    pub game_ids: HashMap<NaiveDate, Vec<String>>,
    pub boxscores: HashMap<String, Value>,
    pub pbp: HashMap<String, Value>,
    pub polls: Mutex<VecDeque<Result<PollResponse, SyncError>>>,
    /// Validators received by `poll_game`, in call order
    pub seen_validators: Mutex<Vec<Option<String>>>,
    assets: AssetUrls,
}

impl FakeProvider {
    pub fn new() -> Self {
        FakeProvider {
            scoreboard: None,
            game_ids: HashMap::new(),
            boxscores: HashMap::new(),
            pbp: HashMap::new(),
            polls: Mutex::new(VecDeque::new()),
            seen_validators: Mutex::new(Vec::new()),
            assets: AssetUrls::new("http://provider.test").unwrap(),
        }
    }

    pub fn push_poll(&self, res: Result<PollResponse, SyncError>) {
        self.polls.lock().unwrap().push_back(res);
    }
}

fn missing(what: &str) -> SyncError {
    SyncError::UpstreamError {
        status: 502,
        message: format!("no {} configured", what),
    }
}

#[async_trait]
impl GameDataProvider for FakeProvider {
    async fn scoreboard_today(&self) -> Result<Value, SyncError> {
        self.scoreboard.clone().ok_or_else(|| missing("scoreboard"))
    }

    async fn game_ids_for_date(&self, date: NaiveDate) -> Result<Vec<String>, SyncError> {
        Ok(self.game_ids.get(&date).cloned().unwrap_or_default())
    }

    async fn boxscore(&self, game_id: &str) -> Result<Value, SyncError> {
        self.boxscores
            .get(game_id)
            .cloned()
            .ok_or_else(|| missing("boxscore"))
    }

    async fn play_by_play(&self, game_id: &str) -> Result<Value, SyncError> {
        self.pbp.get(game_id).cloned().ok_or_else(|| missing("pbp"))
    }

    async fn poll_game(
        &self,
        _game_id: &str,
        validator: Option<&str>,
    ) -> Result<PollResponse, SyncError> {
        self.seen_validators
            .lock()
            .unwrap()
            .push(validator.map(str::to_string));
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(missing("poll response")))
    }

    fn assets(&self) -> &AssetUrls {
        &self.assets
    }

    fn name(&self) -> &str {
        "FakeProvider"
    }
}
