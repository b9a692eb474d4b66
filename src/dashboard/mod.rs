use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::provider::GameDataProvider;
use crate::scoreboard::fetch_game_cards;
use crate::sync::PollScheduler;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<PollScheduler>,
    pub provider: Arc<dyn GameDataProvider>,
    /// Set when the initial snapshot could not be built
    pub load_error: Arc<RwLock<Option<String>>>,
}

/// Build the Axum router for the view layer.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/session", get(session_handler))
        .route("/api/games", get(games_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// GET /api/snapshot
///
/// 202 while loading, 502 if the initial load failed.
async fn snapshot_handler(State(state): State<Arc<AppState>>) -> Response {
    if let Some(snapshot) = state.scheduler.snapshot() {
        return Json(snapshot).into_response();
    }
    match state.load_error.read().await.as_ref() {
        Some(err) => (StatusCode::BAD_GATEWAY, Json(json!({ "error": err }))).into_response(),
        None => (StatusCode::ACCEPTED, Json(json!({ "state": "loading" }))).into_response(),
    }
}

/// GET /api/session
async fn session_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scheduler.status())
}

#[derive(Debug, Deserialize)]
struct GamesQuery {
    date: Option<NaiveDate>,
}

/// GET /api/games?date=YYYY-MM-DD
async fn games_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GamesQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    fetch_game_cards(state.provider.as_ref(), query.date)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("{:#}", e)))
}
