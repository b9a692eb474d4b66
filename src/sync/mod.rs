//! Incremental synchronization engine.
//!
//! ```text
//!  build_initial_snapshot ──▶ PollScheduler ──every interval──▶ run_sync_cycle
//!                                  ▲                              │ DeltaSource::fetch
//!                                  │                              │ merge
//!                                  └──── {snapshot, validator} ◀──┘
//! ```

pub mod fetcher;
pub mod merge;
pub mod scheduler;
pub mod snapshot;

pub use fetcher::{DeltaFetcher, DeltaSource, FetchOutcome};
pub use merge::merge;
pub use scheduler::PollScheduler;
pub use snapshot::build_snapshot;

use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::SyncError;
use crate::models::Snapshot;
use crate::provider::GameDataProvider;

/// Fetch the boxscore and play-by-play for `game_id` and build the first
/// snapshot.
///
/// A failed or malformed boxscore is an initialization failure. A failed
/// play-by-play is not: pregame games legitimately have none.
pub async fn build_initial_snapshot(
    provider: &dyn GameDataProvider,
    game_id: &str,
) -> Result<Snapshot, SyncError> {
    let (boxscore, pbp) = tokio::join!(provider.boxscore(game_id), provider.play_by_play(game_id));

    let init_err = |source: SyncError| SyncError::Initialization {
        game_id: game_id.to_string(),
        source: Box::new(source),
    };

    let boxscore = boxscore.map_err(init_err)?;
    let pbp = match pbp {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("No play-by-play for {} ({}), starting empty", game_id, e);
            None
        }
    };

    let snapshot =
        build_snapshot(game_id, &boxscore, pbp.as_ref(), provider.assets()).map_err(init_err)?;
    info!(
        "Initial snapshot for {}: {} | {} {:?} - {:?} {}",
        game_id,
        snapshot.status_text().unwrap_or("-"),
        snapshot.teams.home.tri_code.as_deref().unwrap_or("HOME"),
        snapshot.teams.home.score,
        snapshot.teams.away.score,
        snapshot.teams.away.tri_code.as_deref().unwrap_or("AWAY"),
    );
    Ok(snapshot)
}

/// Result of one fetch-then-merge cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Validator to send on the next cycle
    pub validator: Option<String>,
    /// Merged snapshot; `None` only when no snapshot existed yet
    pub snapshot: Option<Arc<Snapshot>>,
    pub changed: bool,
    pub terminal: bool,
    /// HTTP-like status of the fetch (0 for transport failures)
    pub status: u16,
}

/// Run one poll cycle against `source`.
///
/// Without a snapshot the fetch still happens so the validator advances, but
/// nothing is merged.
pub async fn run_sync_cycle(
    source: &dyn DeltaSource,
    snapshot: Option<&Arc<Snapshot>>,
    game_id: &str,
    validator: Option<&str>,
) -> CycleReport {
    let outcome = source.fetch(game_id, validator).await;
    let status = outcome.status();
    let next_validator = outcome.next_validator(validator);

    match snapshot {
        Some(current) => {
            let merged = merge(current, &outcome);
            CycleReport {
                validator: next_validator,
                snapshot: Some(merged.snapshot),
                changed: merged.changed,
                terminal: merged.terminal,
                status,
            }
        }
        None => CycleReport {
            validator: next_validator,
            snapshot: None,
            changed: false,
            terminal: false,
            status,
        },
    }
}
