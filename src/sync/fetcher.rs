use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::errors::{SyncError, TRANSPORT_STATUS};
use crate::models::Delta;
use crate::provider::{GameDataProvider, PollResponse};

/// Ceiling for a single conditional fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Classified result of one conditional fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Provider confirmed nothing changed; the validator is carried forward.
    Unchanged { validator: String },
    /// New delta plus the validator the provider returned with it.
    Updated {
        delta: Delta,
        validator: Option<String>,
    },
    /// No usable payload. `status` is 0 for transport failures.
    Failed { status: u16, error: String },
}

impl FetchOutcome {
    /// HTTP-like status of the outcome.
    pub fn status(&self) -> u16 {
        match self {
            FetchOutcome::Unchanged { .. } => 304,
            FetchOutcome::Updated { .. } => 200,
            FetchOutcome::Failed { status, .. } => *status,
        }
    }

    /// Validator to send on the next fetch, given the one sent on this fetch.
    ///
    /// Failures keep the previous validator.
    pub fn next_validator(&self, previous: Option<&str>) -> Option<String> {
        match self {
            FetchOutcome::Unchanged { validator } => Some(validator.clone()),
            FetchOutcome::Updated { validator, .. } => validator.clone(),
            FetchOutcome::Failed { .. } => previous.map(str::to_string),
        }
    }
}

/// Anything that can answer a conditional delta fetch.
///
/// Implementations never fail: every failure class is folded into
/// `FetchOutcome::Failed`.
#[async_trait]
pub trait DeltaSource: Send + Sync {
    async fn fetch(&self, game_id: &str, validator: Option<&str>) -> FetchOutcome;
}

/// Delta source backed by a provider's conditional poll endpoint.
pub struct DeltaFetcher {
    provider: Arc<dyn GameDataProvider>,
    timeout: Duration,
}

impl DeltaFetcher {
    pub fn new(provider: Arc<dyn GameDataProvider>, timeout: Duration) -> Self {
        DeltaFetcher { provider, timeout }
    }
}

#[async_trait]
impl DeltaSource for DeltaFetcher {
    async fn fetch(&self, game_id: &str, validator: Option<&str>) -> FetchOutcome {
        let res = match tokio::time::timeout(
            self.timeout,
            self.provider.poll_game(game_id, validator),
        )
        .await
        {
            Ok(res) => res,
            Err(_) => Err(SyncError::TransportFailure {
                message: format!("timed out after {:?}", self.timeout),
            }),
        };

        let outcome = classify(validator, res);
        debug!(
            "[{}] poll {} -> {}",
            self.provider.name(),
            game_id,
            outcome.status()
        );
        outcome
    }
}

/// Turn a raw poll response into a `FetchOutcome`.
pub fn classify(sent: Option<&str>, res: Result<PollResponse, SyncError>) -> FetchOutcome {
    let resp = match res {
        Ok(resp) => resp,
        Err(e) => {
            // No response was observed, so report the transport sentinel
            return FetchOutcome::Failed {
                status: e.status().unwrap_or(TRANSPORT_STATUS),
                error: e.to_string(),
            }
        }
    };

    if resp.status == 304 {
        // Not-modified is only meaningful as an answer to a conditional request
        return match sent {
            Some(v) => FetchOutcome::Unchanged {
                validator: v.to_string(),
            },
            None => FetchOutcome::Failed {
                status: 304,
                error: "not-modified answer to an unconditional request".to_string(),
            },
        };
    }

    if !(200..300).contains(&resp.status) {
        return FetchOutcome::Failed {
            status: resp.status,
            error: SyncError::UpstreamError {
                status: resp.status,
                message: "poll rejected".to_string(),
            }
            .to_string(),
        };
    }

    let Some(body) = resp.body else {
        return FetchOutcome::Failed {
            status: resp.status,
            error: SyncError::malformed("empty poll body").to_string(),
        };
    };

    match serde_json::from_value::<Delta>(body) {
        Ok(delta) => FetchOutcome::Updated {
            delta,
            validator: resp.validator,
        },
        Err(e) => FetchOutcome::Failed {
            status: resp.status,
            error: SyncError::malformed(e.to_string()).to_string(),
        },
    }
}
