use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::errors::SyncError;
use crate::models::{
    current_period, int, Arena, Meta, PeriodScore, PlayerEntry, PlayerStats, Snapshot, Teams,
    TeamSnapshot,
};
use crate::provider::AssetUrls;

/// Build the first full snapshot from a boxscore document and an optional
/// play-by-play document.
///
/// A missing `game` object is a malformed payload. Missing teams, players or
/// stats fall back to empty defaults; a missing play-by-play is an empty
/// sequence.
pub fn build_snapshot(
    game_id: &str,
    boxscore: &Value,
    play_by_play: Option<&Value>,
    assets: &AssetUrls,
) -> Result<Snapshot, SyncError> {
    let game = boxscore
        .get("game")
        .filter(|g| g.is_object())
        .ok_or_else(|| SyncError::malformed("boxscore has no 'game' object"))?;

    let arena = &game["arena"];
    let meta = Meta {
        game_id: game_id.to_string(),
        status_text: string(&game["gameStatusText"]),
        game_clock: string(&game["gameClock"]),
        period: current_period(&game["period"]),
        attendance: int(&game["attendance"]),
        arena: Arena {
            name: string(&arena["arenaName"]),
            city: string(&arena["arenaCity"]),
            state: string(&arena["arenaState"]),
            tz: string(&arena["arenaTimezone"]),
        },
    };

    let actions = play_by_play
        .and_then(|pbp| pbp["game"]["actions"].as_array())
        .cloned()
        .unwrap_or_default();

    Ok(Snapshot {
        meta: Arc::new(meta),
        teams: Teams {
            home: Arc::new(build_team(&game["homeTeam"], assets)),
            away: Arc::new(build_team(&game["awayTeam"], assets)),
        },
        play_by_play: Arc::new(actions),
    })
}

fn build_team(team: &Value, assets: &AssetUrls) -> TeamSnapshot {
    let team_id = int(&team["teamId"]);

    let periods: Vec<PeriodScore> = team["periods"]
        .as_array()
        .map(|ps| {
            ps.iter()
                .map(|p| PeriodScore {
                    period: int(&p["period"]),
                    period_type: string(&p["periodType"]),
                    score: int(&p["score"]),
                })
                .collect()
        })
        .unwrap_or_default();

    let totals = team["statistics"]
        .as_object()
        .cloned()
        .unwrap_or_else(Map::new);

    let players: Vec<Arc<PlayerEntry>> = team["players"]
        .as_array()
        .map(|ps| {
            ps.iter()
                .filter_map(|p| build_player(p, assets))
                .map(Arc::new)
                .collect()
        })
        .unwrap_or_default();

    TeamSnapshot {
        team_id,
        tri_code: string(&team["teamTricode"]),
        score: int(&team["score"]),
        logo: team_id.map(|id| assets.team_logo(id)),
        periods: Arc::new(periods),
        totals: Arc::new(totals),
        players,
    }
}

fn build_player(p: &Value, assets: &AssetUrls) -> Option<PlayerEntry> {
    let Some(player_id) = int(&p["personId"]) else {
        debug!("Skipping roster entry without personId: {}", p["name"]);
        return None;
    };
    let s = &p["statistics"];

    let stats = PlayerStats {
        pts: int(&s["points"]),
        // `rebounds` is the older field name; a zero there is treated as unknown
        reb: int(&s["reboundsTotal"]).or_else(|| int(&s["rebounds"]).filter(|r| *r != 0)),
        ast: int(&s["assists"]),
        stl: int(&s["steals"]),
        blk: int(&s["blocks"]),
        tov: int(&s["turnovers"]),
        pf: int(&s["foulsPersonal"]),
        fgm: int(&s["fieldGoalsMade"]),
        fga: int(&s["fieldGoalsAttempted"]),
        fg_pct: s["fieldGoalsPercentage"].as_f64(),
        ftm: int(&s["freeThrowsMade"]),
        fta: int(&s["freeThrowsAttempted"]),
        ft_pct: s["freeThrowsPercentage"].as_f64(),
        tpm: int(&s["threePointersMade"]),
        tpa: int(&s["threePointersAttempted"]),
        tp_pct: s["threePointersPercentage"].as_f64(),
        plus_minus: s["plusMinusPoints"].as_f64(),
        minutes: string(&s["minutes"]).or_else(|| string(&s["minutesCalculated"])),
    };

    Some(PlayerEntry {
        player_id,
        jersey_num: string(&p["jerseyNum"]),
        name: string(&p["name"]),
        position: string(&p["position"]),
        starter: p["starter"].as_str() == Some("1"),
        oncourt: p["oncourt"].as_str() == Some("1"),
        stats,
        headshot: Some(assets.player_headshot(player_id)),
    })
}

// ── Value helpers ─────────────────────────────────────────────────────────────

pub(crate) fn string(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}
