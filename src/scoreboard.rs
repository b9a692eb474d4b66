use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info};

use crate::models::{current_period, int, GameCard, TeamCard};
use crate::provider::{AssetUrls, GameDataProvider};
use crate::sync::snapshot::string;

/// List the games for `date`, or today's games when `date` is `None`.
///
/// Today comes from a single scoreboard call. Other dates resolve game ids
/// first and then fetch every boxscore concurrently; boxscores that fail are
/// left out.
pub async fn fetch_game_cards(
    provider: &dyn GameDataProvider,
    date: Option<NaiveDate>,
) -> Result<Vec<GameCard>> {
    let Some(date) = date else {
        let sb = provider
            .scoreboard_today()
            .await
            .context("Failed to fetch today's scoreboard")?;
        return Ok(cards_from_scoreboard(&sb, provider.assets()));
    };

    let game_ids = provider
        .game_ids_for_date(date)
        .await
        .with_context(|| format!("Failed to look up games for {}", date))?;
    if game_ids.is_empty() {
        return Ok(vec![]);
    }

    let boxes = join_all(game_ids.iter().map(|id| provider.boxscore(id))).await;
    let start_date = date.format("%Y-%m-%d").to_string();

    let cards: Vec<GameCard> = game_ids
        .iter()
        .zip(boxes)
        .filter_map(|(id, res)| match res {
            Ok(doc) => card_from_boxscore(&doc, &start_date, provider.assets()),
            Err(e) => {
                debug!("Dropping {} from {}: {}", id, start_date, e);
                None
            }
        })
        .collect();

    info!(
        "{} of {} games loaded for {}",
        cards.len(),
        game_ids.len(),
        start_date
    );
    Ok(cards)
}

fn cards_from_scoreboard(sb: &Value, assets: &AssetUrls) -> Vec<GameCard> {
    let board = &sb["scoreboard"];
    let start_date = string(&board["gameDate"]);

    board["games"]
        .as_array()
        .map(|games| {
            games
                .iter()
                .filter_map(|g| {
                    Some(GameCard {
                        game_id: string(&g["gameId"])?,
                        status_text: string(&g["gameStatusText"]),
                        game_clock: string(&g["gameClock"]),
                        period: current_period(&g["period"]),
                        start_date: start_date.clone(),
                        arena: string(&g["arena"]["name"]),
                        city: string(&g["arena"]["city"]),
                        home: team_card(&g["homeTeam"], assets),
                        away: team_card(&g["awayTeam"], assets),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn card_from_boxscore(doc: &Value, start_date: &str, assets: &AssetUrls) -> Option<GameCard> {
    let game = doc.get("game").filter(|g| g.is_object())?;
    Some(GameCard {
        game_id: string(&game["gameId"])?,
        status_text: string(&game["gameStatusText"]),
        game_clock: string(&game["gameClock"]),
        period: current_period(&game["period"]),
        start_date: Some(start_date.to_string()),
        arena: string(&game["arena"]["arenaName"]),
        city: string(&game["arena"]["arenaCity"]),
        home: team_card(&game["homeTeam"], assets),
        away: team_card(&game["awayTeam"], assets),
    })
}

fn team_card(team: &Value, assets: &AssetUrls) -> TeamCard {
    let team_id = int(&team["teamId"]);
    TeamCard {
        team_id,
        tri_code: string(&team["teamTricode"]),
        score: int(&team["score"]),
        logo: team_id.map(|id| assets.team_logo(id)),
    }
}
