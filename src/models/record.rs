use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::k8s::Pod;

/// Composite identity of a pod instance across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodKey {
    pub cluster: String,
    pub namespace: String,
    pub pod: String,
}

/// One abnormal-pod finding. Immutable once produced; a snapshot is an
/// ordered list of these, and a pod appears at most once per snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbnormalPodRecord {
    pub timestamp: String,
    pub cluster: String,
    pub context: String,
    pub namespace: String,
    pub pod: String,
    pub status: String,
    pub node: String,
    pub reasons: String,
}

impl AbnormalPodRecord {
    pub fn from_pod(
        cluster: &str,
        context: &str,
        pod: &Pod,
        reasons: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp: now.to_rfc3339(),
            cluster: cluster.to_string(),
            context: context.to_string(),
            namespace: pod.metadata.namespace.clone(),
            pod: pod.metadata.name.clone(),
            status: if pod.status.phase.is_empty() {
                "Unknown".to_string()
            } else {
                pod.status.phase.clone()
            },
            node: if pod.spec.node_name.is_empty() {
                "N/A".to_string()
            } else {
                pod.spec.node_name.clone()
            },
            reasons: if reasons.is_empty() {
                "N/A".to_string()
            } else {
                reasons.join(", ")
            },
        }
    }

    /// Synthetic record standing in for a cluster that could not be scanned.
    /// Its key is stable across days, so a cluster that stays unreachable
    /// shows up as ongoing rather than flapping between new and resolved.
    pub fn cluster_error(
        cluster: &str,
        context: &str,
        status: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp: now.to_rfc3339(),
            cluster: cluster.to_string(),
            context: context.to_string(),
            namespace: "N/A".to_string(),
            pod: "N/A".to_string(),
            status: status.to_string(),
            node: "N/A".to_string(),
            reasons: reason.to_string(),
        }
    }

    pub fn key(&self) -> PodKey {
        PodKey {
            cluster: self.cluster.clone(),
            namespace: self.namespace.clone(),
            pod: self.pod.clone(),
        }
    }
}
