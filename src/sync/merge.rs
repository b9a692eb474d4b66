//! Immutable delta merging.
//!
//! Only the fields the slim delta carries are compared: status text, game
//! clock, period, the two team scores and per-player points. Everything else
//! (rebounds, shooting splits, team totals, play-by-play) converges only
//! through a full snapshot rebuild.

use std::collections::HashMap;
use std::sync::Arc;

use super::fetcher::FetchOutcome;
use crate::models::{Delta, DeltaPlayer, DeltaStatus, Meta, Snapshot, TeamSnapshot, Teams};

#[derive(Debug, Clone)]
pub struct MergeResult {
    pub snapshot: Arc<Snapshot>,
    pub changed: bool,
    pub terminal: bool,
}

impl MergeResult {
    fn unchanged(current: &Arc<Snapshot>) -> Self {
        MergeResult {
            snapshot: Arc::clone(current),
            changed: false,
            terminal: false,
        }
    }
}

/// Fold a fetch outcome into `current`.
///
/// `Unchanged` and `Failed` outcomes return the same `Arc`, unchanged and
/// non-terminal.
pub fn merge(current: &Arc<Snapshot>, outcome: &FetchOutcome) -> MergeResult {
    match outcome {
        FetchOutcome::Updated { delta, .. } => apply_delta(current, delta),
        FetchOutcome::Unchanged { .. } | FetchOutcome::Failed { .. } => {
            MergeResult::unchanged(current)
        }
    }
}

/// Apply a delta field by field.
///
/// A field is overwritten only when the delta supplies a value that differs
/// from the current one. When nothing differs the input `Arc` is returned;
/// otherwise a new top-level snapshot shares every untouched substructure.
pub fn apply_delta(current: &Arc<Snapshot>, delta: &Delta) -> MergeResult {
    let meta = delta
        .status
        .as_ref()
        .and_then(|status| merge_meta(&current.meta, status));

    let scores = delta.scores.as_ref();
    let players = delta.players.as_ref();

    let home = merge_team(
        &current.teams.home,
        scores.and_then(|s| s.home.as_ref()).and_then(|h| h.score),
        players.and_then(|p| p.home.as_deref()).unwrap_or_default(),
    );
    let away = merge_team(
        &current.teams.away,
        scores.and_then(|s| s.away.as_ref()).and_then(|a| a.score),
        players.and_then(|p| p.away.as_deref()).unwrap_or_default(),
    );

    let changed = meta.is_some() || home.is_some() || away.is_some();
    let snapshot = if changed {
        Arc::new(Snapshot {
            meta: meta.unwrap_or_else(|| Arc::clone(&current.meta)),
            teams: Teams {
                home: home.unwrap_or_else(|| Arc::clone(&current.teams.home)),
                away: away.unwrap_or_else(|| Arc::clone(&current.teams.away)),
            },
            play_by_play: Arc::clone(&current.play_by_play),
        })
    } else {
        Arc::clone(current)
    };

    let terminal = snapshot.is_final();
    MergeResult {
        snapshot,
        changed,
        terminal,
    }
}

/// New meta if status text, clock or period differ; `None` otherwise.
fn merge_meta(meta: &Arc<Meta>, status: &DeltaStatus) -> Option<Arc<Meta>> {
    let mut next: Option<Meta> = None;

    if let Some(text) = &status.game_status_text {
        if meta.status_text.as_ref() != Some(text) {
            next.get_or_insert_with(|| Meta::clone(meta)).status_text = Some(text.clone());
        }
    }
    if let Some(clock) = &status.game_clock {
        if meta.game_clock.as_ref() != Some(clock) {
            next.get_or_insert_with(|| Meta::clone(meta)).game_clock = Some(clock.clone());
        }
    }
    if let Some(period) = status.period {
        if meta.period != Some(period) {
            next.get_or_insert_with(|| Meta::clone(meta)).period = Some(period);
        }
    }

    next.map(Arc::new)
}

/// New team if the score or any matched player's points differ.
fn merge_team(
    team: &Arc<TeamSnapshot>,
    score: Option<i64>,
    delta_players: &[DeltaPlayer],
) -> Option<Arc<TeamSnapshot>> {
    let score_changed = score.is_some_and(|s| team.score != Some(s));

    let pts_by_id: HashMap<i64, i64> = delta_players
        .iter()
        .filter_map(|p| Some((p.player_id?, p.pts?)))
        .collect();

    let mut players_changed = false;
    let players: Vec<_> = team
        .players
        .iter()
        .map(|player| match pts_by_id.get(&player.player_id) {
            Some(&pts) if player.stats.pts != Some(pts) => {
                players_changed = true;
                let mut updated = (**player).clone();
                updated.stats.pts = Some(pts);
                Arc::new(updated)
            }
            _ => Arc::clone(player),
        })
        .collect();

    if !score_changed && !players_changed {
        return None;
    }

    let mut next = TeamSnapshot::clone(team);
    if let Some(s) = score {
        next.score = Some(s);
    }
    next.players = players;
    Some(Arc::new(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Delta;
    use crate::sync::snapshot::build_snapshot;
    use crate::sync::snapshot::tests::{assets, boxscore};
    use serde_json::json;

    fn initial(status: &str, home: i64, away: i64) -> Arc<Snapshot> {
        Arc::new(build_snapshot("0022400548", &boxscore(status, home, away), None, &assets()).unwrap())
    }

    fn delta(v: serde_json::Value) -> Delta {
        serde_json::from_value(v).unwrap()
    }

    fn updated(v: serde_json::Value) -> FetchOutcome {
        FetchOutcome::Updated {
            delta: delta(v),
            validator: Some("\"v2\"".into()),
        }
    }

    #[test]
    fn test_noop_outcomes_return_same_snapshot() {
        let snap = initial("Q3", 50, 48);
        for outcome in [
            FetchOutcome::Unchanged {
                validator: "\"v1\"".into(),
            },
            FetchOutcome::Failed {
                status: 0,
                error: "timeout".into(),
            },
        ] {
            let res = merge(&snap, &outcome);
            assert!(!res.changed);
            assert!(!res.terminal);
            assert!(Arc::ptr_eq(&res.snapshot, &snap));
        }
    }

    #[test]
    fn test_status_and_home_score_scenario() {
        let snap = initial("Q3", 50, 48);
        let res = merge(
            &snap,
            &updated(json!({"status": {"gameStatusText": "Q4"}, "scores": {"home": {"score": 55}}})),
        );

        assert!(res.changed);
        assert!(!res.terminal);
        assert_eq!(res.snapshot.teams.home.score, Some(55));
        assert_eq!(res.snapshot.teams.away.score, Some(48));
        assert_eq!(res.snapshot.status_text(), Some("Q4"));
        // Untouched substructures are shared, not copied
        assert!(Arc::ptr_eq(&res.snapshot.teams.away, &snap.teams.away));
        assert!(Arc::ptr_eq(&res.snapshot.play_by_play, &snap.play_by_play));
        assert!(Arc::ptr_eq(
            &res.snapshot.teams.home.players[0],
            &snap.teams.home.players[0]
        ));
        // Input is untouched
        assert_eq!(snap.teams.home.score, Some(50));
        assert_eq!(snap.status_text(), Some("Q3"));
    }

    #[test]
    fn test_single_field_change_leaves_siblings() {
        let snap = initial("Q3", 100, 98);
        let res = merge(&snap, &updated(json!({"scores": {"home": {"score": 102}}})));

        assert!(res.changed);
        assert!(Arc::ptr_eq(&res.snapshot.meta, &snap.meta));
        assert!(Arc::ptr_eq(&res.snapshot.teams.away, &snap.teams.away));

        let mut expected_home = TeamSnapshot::clone(&snap.teams.home);
        expected_home.score = Some(102);
        assert_eq!(*res.snapshot.teams.home, expected_home);
    }

    #[test]
    fn test_equal_values_are_not_changes() {
        let snap = initial("Q3", 50, 48);
        let res = merge(
            &snap,
            &updated(json!({
                "status": {"gameStatusText": "Q3", "gameClock": "PT05M31.00S", "period": 3},
                "scores": {"home": {"score": 50}, "away": {"score": 48}},
                "players": {"home": [{"playerId": 1629060, "pts": 12}], "away": []}
            })),
        );
        assert!(!res.changed);
        assert!(Arc::ptr_eq(&res.snapshot, &snap));
    }

    #[test]
    fn test_absent_and_null_fields_leave_values() {
        let snap = initial("Q3", 50, 48);
        let res = merge(
            &snap,
            &updated(json!({"status": null, "scores": {"home": {"score": null}}, "players": {}})),
        );
        assert!(!res.changed);
        assert_eq!(res.snapshot.teams.home.score, Some(50));
    }

    #[test]
    fn test_player_points_matched_by_id() {
        let snap = initial("Q3", 50, 48);
        let res = merge(
            &snap,
            &updated(json!({
                "players": {
                    "home": [
                        {"playerId": 1630166, "pts": 10},
                        {"playerId": 1629060, "pts": 12},
                        {"playerId": 999, "pts": 40}
                    ],
                    "away": [{"playerId": 1630162, "pts": 22}]
                }
            })),
        );

        assert!(res.changed);
        let home = &res.snapshot.teams.home;
        assert!(Arc::ptr_eq(&home.players[0], &snap.teams.home.players[0]));
        assert_eq!(home.players[1].stats.pts, Some(10));
        // Deep stats are left alone
        assert_eq!(home.players[1].stats.reb, snap.teams.home.players[1].stats.reb);
        assert_eq!(home.players.len(), 2);
        assert_eq!(res.snapshot.teams.away.players[0].stats.pts, Some(22));
        assert_eq!(home.score, Some(50));
    }

    #[test]
    fn test_nested_period_in_delta() {
        let snap = initial("Q3", 50, 48);
        let res = merge(&snap, &updated(json!({"status": {"period": {"current": 4}}})));
        assert!(res.changed);
        assert_eq!(res.snapshot.meta.period, Some(4));
        assert!(Arc::ptr_eq(&res.snapshot.teams.home, &snap.teams.home));
    }

    #[test]
    fn test_final_is_terminal() {
        let snap = initial("Q4 0:12", 110, 108);
        let res = merge(&snap, &updated(json!({"status": {"gameStatusText": "Final"}})));
        assert!(res.changed);
        assert!(res.terminal);

        let other = merge(&snap, &updated(json!({"status": {"gameStatusText": "Final/OT"}})));
        assert!(!other.terminal);
    }
}
