/// Status reported for failures that never reached the provider.
pub const TRANSPORT_STATUS: u16 = 0;

/// Failure classes of the synchronization engine.
///
/// The fetcher and merge engine fold the first three into no-op outcomes;
/// only `Initialization` is surfaced to the consumer.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Transport failure: {message}")]
    TransportFailure { message: String },

    #[error("Upstream returned status {status}: {message}")]
    UpstreamError { status: u16, message: String },

    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    #[error("Initial snapshot for game '{game_id}' could not be built: {source}")]
    Initialization {
        game_id: String,
        #[source]
        source: Box<SyncError>,
    },

    #[error("Scheduler cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl SyncError {
    pub fn malformed(message: impl Into<String>) -> Self {
        SyncError::MalformedPayload {
            message: message.into(),
        }
    }

    /// HTTP-like status code for this failure (0 for transport failures).
    ///
    /// `None` when the failure carries no status of its own.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::TransportFailure { .. } => Some(TRANSPORT_STATUS),
            SyncError::UpstreamError { status, .. } => Some(*status),
            SyncError::MalformedPayload { .. } => None,
            SyncError::Initialization { source, .. } => source.status(),
            SyncError::InvalidTransition { .. } => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SyncError::UpstreamError {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => SyncError::malformed(err.to_string()),
            None => SyncError::TransportFailure {
                message: err.to_string(),
            },
        }
    }
}
