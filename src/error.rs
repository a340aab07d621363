use thiserror::Error;

/// Per-cluster collection failures. These never abort a scan cycle; the
/// orchestrator records them as a synthetic cluster-level finding and moves on.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("connection failed: {0}")]
    Connectivity(String),
    #[error("API call timed out after {0} seconds")]
    Timeout(u64),
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("client provisioning failed: {0}")]
    Auth(String),
}

impl CollectError {
    /// Status string used for the synthetic record a failing cluster leaves
    /// behind in the snapshot.
    pub fn status_label(&self) -> &'static str {
        match self {
            CollectError::Timeout(_) => "CONNECTION_TIMEOUT",
            CollectError::Api { .. } => "API_ERROR",
            CollectError::Connectivity(_) | CollectError::Auth(_) => "CONNECTION_ERROR",
        }
    }
}

/// Snapshot save failures. Load failures are absorbed by the store itself.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of a key-partition strategy. The diff engine catches these and
/// recomputes with the reference implementation.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("strategy failed: {0}")]
    Failed(String),
    #[error("invalid partition: {0}")]
    InvalidPartition(&'static str),
}
