use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{AssetUrls, GameDataProvider, PollResponse};
use crate::errors::SyncError;

/// Game-data provider reached over HTTP.
///
/// Speaks to the proxy routes in front of the league CDN: `/scoreboard`,
/// `/game/{id}/boxscore`, `/game/{id}/pbp` and the ETag-aware
/// `/poll/game/{id}`.
pub struct HttpProvider {
    http: Client,
    base_url: String,
    assets: AssetUrls,
}

impl HttpProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let assets = AssetUrls::new(base_url)
            .with_context(|| format!("Invalid provider URL '{}'", base_url))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpProvider {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            assets,
        })
    }

    /// Liveness probe against `/health`.
    pub async fn health(&self) -> Result<bool, SyncError> {
        let raw = self.get_json(&format!("{}/health", self.base_url)).await?;
        Ok(raw["ok"].as_bool().unwrap_or(false))
    }

    async fn get_json(&self, url: &str) -> Result<Value, SyncError> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::UpstreamError {
                status: status.as_u16(),
                message: body,
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| SyncError::malformed(e.to_string()))
    }
}

#[async_trait]
impl GameDataProvider for HttpProvider {
    async fn scoreboard_today(&self) -> Result<Value, SyncError> {
        self.get_json(&format!("{}/scoreboard", self.base_url)).await
    }

    async fn game_ids_for_date(&self, date: NaiveDate) -> Result<Vec<String>, SyncError> {
        let url = format!("{}/scoreboard", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(SyncError::UpstreamError {
                status: resp.status().as_u16(),
                message: format!("schedule lookup for {} failed", date),
            });
        }

        let raw: Value = resp
            .json()
            .await
            .map_err(|e| SyncError::malformed(e.to_string()))?;

        if let Some(err) = raw["error"].as_str() {
            debug!("Schedule lookup for {} reported: {}", date, err);
        }

        Ok(raw["gameIds"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn boxscore(&self, game_id: &str) -> Result<Value, SyncError> {
        self.get_json(&format!("{}/game/{}/boxscore", self.base_url, game_id))
            .await
    }

    async fn play_by_play(&self, game_id: &str) -> Result<Value, SyncError> {
        self.get_json(&format!("{}/game/{}/pbp", self.base_url, game_id))
            .await
    }

    async fn poll_game(
        &self,
        game_id: &str,
        validator: Option<&str>,
    ) -> Result<PollResponse, SyncError> {
        let url = format!("{}/poll/game/{}", self.base_url, game_id);
        let mut req = self.http.get(&url);
        if let Some(tag) = validator {
            req = req.header(IF_NONE_MATCH, tag);
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status == StatusCode::NOT_MODIFIED {
            return Ok(PollResponse {
                status: status.as_u16(),
                validator: None,
                body: None,
            });
        }

        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // An unreadable body is reported as "no payload", not as a failure.
        let body = if status.is_success() {
            match resp.json::<Value>().await {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!("Poll body for {} unreadable: {}", game_id, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(PollResponse {
            status: status.as_u16(),
            validator: etag,
            body,
        })
    }

    fn assets(&self) -> &AssetUrls {
        &self.assets
    }

    fn name(&self) -> &str {
        "HttpProvider"
    }
}
