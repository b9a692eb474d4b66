use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Immutable view of one game at a point in time.
///
/// Nested values sit behind `Arc` so a merge can build a new top-level
/// snapshot while reusing every substructure it did not touch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub meta: Arc<Meta>,
    pub teams: Teams,
    /// Raw play-by-play actions, oldest first
    pub play_by_play: Arc<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Teams {
    pub home: Arc<TeamSnapshot>,
    pub away: Arc<TeamSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub game_id: String,
    /// e.g. "Q3 5:31", "Final", "7:30 pm ET"
    pub status_text: Option<String>,
    /// ISO-8601 duration, e.g. "PT05M31.00S"
    pub game_clock: Option<String>,
    pub period: Option<i64>,
    pub attendance: Option<i64>,
    pub arena: Arena,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Arena {
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub tz: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSnapshot {
    pub team_id: Option<i64>,
    pub tri_code: Option<String>,
    pub score: Option<i64>,
    pub logo: Option<String>,
    pub periods: Arc<Vec<PeriodScore>>,
    /// Aggregate team statistics exactly as the provider reports them
    pub totals: Arc<Map<String, Value>>,
    pub players: Vec<Arc<PlayerEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodScore {
    pub period: Option<i64>,
    pub period_type: Option<String>,
    pub score: Option<i64>,
}

/// One roster member. Matched across snapshots by `player_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub player_id: i64,
    pub jersey_num: Option<String>,
    pub name: Option<String>,
    pub position: Option<String>,
    pub starter: bool,
    pub oncourt: bool,
    pub stats: PlayerStats,
    pub headshot: Option<String>,
}

/// Fixed per-player stat schema; anything the provider omits is `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub pts: Option<i64>,
    pub reb: Option<i64>,
    pub ast: Option<i64>,
    pub stl: Option<i64>,
    pub blk: Option<i64>,
    pub tov: Option<i64>,
    pub pf: Option<i64>,
    pub fgm: Option<i64>,
    pub fga: Option<i64>,
    pub fg_pct: Option<f64>,
    pub ftm: Option<i64>,
    pub fta: Option<i64>,
    pub ft_pct: Option<f64>,
    pub tpm: Option<i64>,
    pub tpa: Option<i64>,
    pub tp_pct: Option<f64>,
    pub plus_minus: Option<f64>,
    pub minutes: Option<String>,
}

impl Snapshot {
    pub fn status_text(&self) -> Option<&str> {
        self.meta.status_text.as_deref()
    }

    pub fn is_final(&self) -> bool {
        self.status_text() == Some(FINAL_STATUS)
    }
}

/// Status text the provider uses once a game has concluded.
pub const FINAL_STATUS: &str = "Final";

// ── Delta ─────────────────────────────────────────────────────────────────────

/// Slim update payload from the poll endpoint.
///
/// Every field is optional: absent (or `null`) means "unchanged". Numeric
/// fields that cannot be read as an integer are treated as absent too.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    pub status: Option<DeltaStatus>,
    pub scores: Option<DeltaScores>,
    pub players: Option<DeltaPlayers>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaStatus {
    pub game_status_text: Option<String>,
    pub game_clock: Option<String>,
    #[serde(default, deserialize_with = "lenient_period")]
    pub period: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeltaScores {
    pub home: Option<DeltaTeamScore>,
    pub away: Option<DeltaTeamScore>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaTeamScore {
    #[serde(default, deserialize_with = "lenient_int")]
    pub score: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeltaPlayers {
    pub home: Option<Vec<DeltaPlayer>>,
    pub away: Option<Vec<DeltaPlayer>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaPlayer {
    #[serde(default, deserialize_with = "lenient_int")]
    pub player_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub pts: Option<i64>,
}

fn lenient_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(int(&Value::deserialize(d)?))
}

fn lenient_period<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(current_period(&Value::deserialize(d)?))
}

/// Integer from a number or a numeric string.
///
/// Floats are accepted only when whole and within `i64` range.
pub fn int(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    let f = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return Some(n);
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Period from a raw provider value. The provider reports it either as a
/// bare number or as `{"current": n, ...}`.
pub fn current_period(raw: &Value) -> Option<i64> {
    match raw {
        Value::Object(o) => o.get("current").and_then(int),
        other => int(other),
    }
}

// ── Game cards ────────────────────────────────────────────────────────────────

/// One game in a day's listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCard {
    pub game_id: String,
    pub status_text: Option<String>,
    pub game_clock: Option<String>,
    pub period: Option<i64>,
    /// YYYY-MM-DD
    pub start_date: Option<String>,
    pub arena: Option<String>,
    pub city: Option<String>,
    pub home: TeamCard,
    pub away: TeamCard,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamCard {
    pub team_id: Option<i64>,
    pub tri_code: Option<String>,
    pub score: Option<i64>,
    pub logo: Option<String>,
}

// ── Clock rendering ───────────────────────────────────────────────────────────

/// Render an ISO-8601 game clock ("PT05M31.00S") as "HH:MM:SS".
///
/// Fractional seconds are floored. Input without a "PT" marker renders as
/// "00:00:00".
pub fn format_game_clock(duration: &str) -> String {
    let Some(start) = duration.find("PT") else {
        return "00:00:00".to_string();
    };

    let mut hours = 0u64;
    let mut minutes = 0u64;
    let mut seconds = 0f64;
    let mut number = String::new();

    for c in duration[start + 2..].chars() {
        match c {
            '0'..='9' | '.' => number.push(c),
            'H' => hours = number.parse().unwrap_or(0),
            'M' => minutes = number.parse().unwrap_or(0),
            'S' => seconds = number.parse().unwrap_or(0.0),
            _ => break,
        }
        if c.is_ascii_alphabetic() {
            number.clear();
        }
    }

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds.floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_game_clock() {
        assert_eq!(format_game_clock("PT34M21.93S"), "00:34:21");
        assert_eq!(format_game_clock("PT1H5M7S"), "01:05:07");
        assert_eq!(format_game_clock("PT00M00.00S"), "00:00:00");
        assert_eq!(format_game_clock(""), "00:00:00");
        assert_eq!(format_game_clock("7:30 pm ET"), "00:00:00");
    }

    #[test]
    fn test_period_both_shapes() {
        assert_eq!(current_period(&json!(3)), Some(3));
        assert_eq!(current_period(&json!({"current": 4, "type": "REGULAR"})), Some(4));
        assert_eq!(current_period(&json!("2")), Some(2));
        assert_eq!(current_period(&Value::Null), None);

        let status: DeltaStatus = serde_json::from_value(json!({"period": {"current": 2}})).unwrap();
        assert_eq!(status.period, Some(2));
        let status: DeltaStatus = serde_json::from_value(json!({"period": 2.0})).unwrap();
        assert_eq!(status.period, Some(2));
    }

    #[test]
    fn test_int_rejects_lossy_floats() {
        assert_eq!(int(&json!(12)), Some(12));
        assert_eq!(int(&json!(12.0)), Some(12));
        assert_eq!(int(&json!(" 7 ")), Some(7));
        assert_eq!(int(&json!("9.0")), Some(9));
        assert_eq!(int(&json!(12.5)), None);
        assert_eq!(int(&json!(1e19)), None);
        assert_eq!(int(&json!(-1e19)), None);
        assert_eq!(int(&json!(u64::MAX)), None);
        assert_eq!(int(&json!("twelve")), None);
        assert_eq!(int(&json!(true)), None);
    }

    #[test]
    fn test_delta_numeric_fields_are_lenient() {
        let delta: Delta = serde_json::from_value(json!({
            "scores": {"home": {"score": "120"}, "away": {"score": 99.5}},
            "players": {"home": [
                {"playerId": 1629060, "pts": 12.0},
                {"playerId": "1630166", "pts": {"value": 8}}
            ]}
        }))
        .unwrap();

        let scores = delta.scores.unwrap();
        assert_eq!(scores.home.unwrap().score, Some(120));
        assert_eq!(scores.away.unwrap().score, None);

        let home = delta.players.unwrap().home.unwrap();
        assert_eq!(home[0].pts, Some(12));
        assert_eq!(home[1].player_id, Some(1630166));
        assert_eq!(home[1].pts, None);
    }

    #[test]
    fn test_delta_absent_fields_are_none() {
        let delta: Delta = serde_json::from_value(json!({
            "status": {"gameStatusText": "Q4"},
            "scores": {"home": {"score": 55}}
        }))
        .unwrap();

        let status = delta.status.unwrap();
        assert_eq!(status.game_status_text.as_deref(), Some("Q4"));
        assert!(status.game_clock.is_none());
        assert!(status.period.is_none());

        let scores = delta.scores.unwrap();
        assert_eq!(scores.home.unwrap().score, Some(55));
        assert!(scores.away.is_none());
        assert!(delta.players.is_none());
    }

    #[test]
    fn test_delta_accepts_server_slim_shape() {
        let delta: Delta = serde_json::from_value(json!({
            "gameId": "0022400548",
            "status": {"gameStatusText": "Q2 4:12", "gameClock": "PT04M12.00S", "period": 2},
            "scores": {
                "home": {"teamId": 1610612764, "triCode": "WAS", "score": 51},
                "away": {"teamId": 1610612750, "triCode": "MIN", "score": 60}
            },
            "players": {
                "home": [{"playerId": 1629060, "jerseyNum": "8", "name": "R. Hachimura", "pts": 12}],
                "away": []
            }
        }))
        .unwrap();

        let players = delta.players.unwrap();
        assert_eq!(players.home.unwrap()[0].pts, Some(12));
        assert!(players.away.unwrap().is_empty());
    }
}
