//! Single-flight, cancellable poll loop for one game.
//!
//! States: `Idle → Active → (Stopped | Terminal)`. The scheduler is the only
//! writer of the held snapshot and validator; readers get `Arc<Snapshot>`
//! values through a `watch` channel and never see a partially applied cycle.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fetcher::DeltaSource;
use super::run_sync_cycle;
use crate::errors::SyncError;
use crate::models::{format_game_clock, Snapshot};

/// Fixed delay between the end of one cycle and the start of the next.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(15_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Active,
    Stopped,
    Terminal,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Active => "active",
            SchedulerState::Stopped => "stopped",
            SchedulerState::Terminal => "terminal",
        };
        f.write_str(s)
    }
}

/// What a single `tick` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another cycle was already in flight
    Busy,
    /// The scheduler is idle, stopped or terminal
    Inactive,
    /// The cycle finished after a stop; its result was dropped
    Discarded,
    Completed {
        changed: bool,
        terminal: bool,
        status: u16,
    },
}

/// Read-only summary for the view layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub game_id: String,
    pub state: SchedulerState,
    pub last_status: Option<u16>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub cycles: u64,
    /// Game clock as HH:MM:SS
    pub clock: Option<String>,
}

#[derive(Default)]
struct CycleState {
    validator: Option<String>,
    last_status: Option<u16>,
    last_cycle_at: Option<DateTime<Utc>>,
    cycles: u64,
}

pub struct PollScheduler {
    game_id: String,
    source: Arc<dyn DeltaSource>,
    interval: Duration,
    snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
    state_tx: watch::Sender<SchedulerState>,
    /// Held while a result is applied and while stopping, so a stop can
    /// never interleave with an application.
    cycle: Mutex<CycleState>,
    in_flight: AtomicBool,
    cancel: CancellationToken,
}

impl PollScheduler {
    pub fn new(game_id: &str, source: Arc<dyn DeltaSource>, interval: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        let (state_tx, _) = watch::channel(SchedulerState::Idle);
        PollScheduler {
            game_id: game_id.to_string(),
            source,
            interval,
            snapshot_tx,
            state_tx,
            cycle: Mutex::new(CycleState::default()),
            in_flight: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn state(&self) -> SchedulerState {
        *self.state_tx.borrow()
    }

    /// Latest published snapshot, if the session has been initialized.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.snapshot_tx.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        let cycle = self.lock_cycle();
        SessionStatus {
            game_id: self.game_id.clone(),
            state: self.state(),
            last_status: cycle.last_status,
            last_cycle_at: cycle.last_cycle_at,
            cycles: cycle.cycles,
            clock: self
                .snapshot()
                .and_then(|s| s.meta.game_clock.as_deref().map(format_game_clock)),
        }
    }

    /// Install the initial snapshot and leave `Idle`.
    ///
    /// A snapshot that is already final goes straight to `Terminal`.
    pub fn activate(&self, initial: Snapshot) -> Result<SchedulerState, SyncError> {
        let _cycle = self.lock_cycle();
        let current = self.state();
        if current != SchedulerState::Idle || self.cancel.is_cancelled() {
            return Err(SyncError::InvalidTransition {
                from: current.to_string(),
                to: SchedulerState::Active.to_string(),
            });
        }

        let next = if initial.is_final() {
            info!("[{}] Game already final, not polling", self.game_id);
            SchedulerState::Terminal
        } else {
            SchedulerState::Active
        };
        self.snapshot_tx.send_replace(Some(Arc::new(initial)));
        self.state_tx.send_replace(next);
        Ok(next)
    }

    /// Activate with `initial` and spawn the poll loop.
    pub fn start(self: &Arc<Self>, initial: Snapshot) -> Result<JoinHandle<()>, SyncError> {
        self.activate(initial)?;
        info!(
            "[{}] Poll scheduler started (interval={:?})",
            self.game_id, self.interval
        );
        Ok(tokio::spawn(Arc::clone(self).run()))
    }

    /// Stop polling. A pending timer is cleared and any in-flight result is
    /// discarded. Has no effect on a terminal scheduler beyond the cancel.
    pub fn stop(&self) {
        let _cycle = self.lock_cycle();
        self.cancel.cancel();
        let stopped = self.state_tx.send_if_modified(|state| {
            if matches!(state, SchedulerState::Idle | SchedulerState::Active) {
                *state = SchedulerState::Stopped;
                true
            } else {
                false
            }
        });
        if stopped {
            info!("[{}] Poll scheduler stopped", self.game_id);
        }
    }

    async fn run(self: Arc<Self>) {
        loop {
            if self.state() != SchedulerState::Active {
                break;
            }

            if let TickOutcome::Completed { status, .. } = self.tick().await {
                if status != 200 && status != 304 {
                    warn!("[{}] Poll failed with status {}", self.game_id, status);
                }
            }

            if self.state() != SchedulerState::Active {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("[{}] Poll loop exited ({})", self.game_id, self.state());
    }

    /// Run one cycle unless another is in flight or the scheduler is not
    /// active.
    pub async fn tick(&self) -> TickOutcome {
        if self.cancel.is_cancelled() || self.state() != SchedulerState::Active {
            return TickOutcome::Inactive;
        }
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("[{}] Cycle already in flight, skipping tick", self.game_id);
            return TickOutcome::Busy;
        };

        let current = self.snapshot();
        let validator = self.lock_cycle().validator.clone();

        let report = run_sync_cycle(
            self.source.as_ref(),
            current.as_ref(),
            &self.game_id,
            validator.as_deref(),
        )
        .await;

        let mut cycle = self.lock_cycle();
        if self.cancel.is_cancelled() || self.state() != SchedulerState::Active {
            debug!("[{}] Discarding cycle result after stop", self.game_id);
            return TickOutcome::Discarded;
        }

        cycle.validator = report.validator;
        cycle.last_status = Some(report.status);
        cycle.last_cycle_at = Some(Utc::now());
        cycle.cycles += 1;

        if report.changed {
            if let Some(next) = report.snapshot {
                debug!(
                    "[{}] Snapshot updated: {} {:?}-{:?}",
                    self.game_id,
                    next.status_text().unwrap_or("-"),
                    next.teams.home.score,
                    next.teams.away.score
                );
                self.snapshot_tx.send_replace(Some(next));
            }
        }

        if report.terminal {
            self.state_tx.send_replace(SchedulerState::Terminal);
            self.cancel.cancel();
            info!("[{}] Game final, polling finished", self.game_id);
        }

        TickOutcome::Completed {
            changed: report.changed,
            terminal: report.terminal,
            status: report.status,
        }
    }

    fn lock_cycle(&self) -> MutexGuard<'_, CycleState> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a cycle as in flight; released on every exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
