use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diff::DiffResult;

/// Aggregate counts for one scan cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ScanStats {
    pub total: usize,
    pub new: usize,
    pub ongoing: usize,
    pub resolved: usize,
}

/// Label/value pairs for one dashboard chart.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Distribution {
    pub labels: Vec<String>,
    pub values: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Charts {
    pub status_distribution: Distribution,
    pub cluster_distribution: Distribution,
}

/// The last successfully computed aggregate result. Replaced wholesale on
/// each successful cycle, never partially mutated; readers keep seeing the
/// previous view while a new cycle runs.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub stats: ScanStats,
    pub lists: DiffResult,
    pub charts: Charts,
    pub last_updated: DateTime<Utc>,
}

/// Outcome of the most recent scan cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum LastResult {
    Never,
    Success,
    Failed(String),
}

/// Process-wide scan state, reset at the start of each cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_result: LastResult,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            running: false,
            last_run: None,
            last_result: LastResult::Never,
        }
    }
}
