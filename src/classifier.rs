use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::helpers::parse_k8s_time;
use crate::models::k8s::{Pod, PodPhase};

/// Waiting reasons that explain a Pending pod still pulling images or
/// creating containers. Other waiting reasons are not pending-specific.
const PENDING_WAITING_REASONS: &[&str] = &["ImagePullBackOff", "ErrImagePull", "ContainerCreating"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub abnormal: bool,
    /// Deduplicated and sorted. Empty when the pod is normal, and possibly
    /// empty on an abnormal pod whose status carries no detail.
    pub reasons: Vec<String>,
}

impl Classification {
    fn normal() -> Self {
        Self {
            abnormal: false,
            reasons: Vec::new(),
        }
    }
}

/// Decide whether a pod is in an abnormal runtime state and why.
///
/// Total over any pod status the API server can return: absent fields are
/// treated as empty, never as errors. `now` is passed in so identical input
/// yields identical output.
pub fn classify(pod: &Pod, now: DateTime<Utc>, pending_threshold: Duration) -> Classification {
    let phase = PodPhase::parse(&pod.status.phase);

    let mut abnormal = !phase.is_normal();
    if phase == PodPhase::Running
        && pod.status.container_statuses.iter().any(|cs| !cs.ready)
    {
        abnormal = true;
    }
    if !abnormal {
        return Classification::normal();
    }

    let mut reasons = BTreeSet::new();
    phase_reasons(pod, phase, now, pending_threshold, &mut reasons);
    container_reasons(pod, &mut reasons);

    Classification {
        abnormal: true,
        reasons: reasons.into_iter().collect(),
    }
}

fn phase_reasons(
    pod: &Pod,
    phase: PodPhase,
    now: DateTime<Utc>,
    pending_threshold: Duration,
    reasons: &mut BTreeSet<String>,
) {
    match phase {
        PodPhase::Failed | PodPhase::Unknown => {
            let label = if pod.status.phase.is_empty() {
                "Unknown"
            } else {
                pod.status.phase.as_str()
            };
            let mut text = format!("Phase: {label}");
            if !pod.status.reason.is_empty() {
                text.push_str(&format!(" ({})", pod.status.reason));
            }
            if !pod.status.message.is_empty() {
                text.push_str(&format!(" - {}", pod.status.message));
            }
            reasons.insert(text);
        }
        PodPhase::Pending => pending_reasons(pod, now, pending_threshold, reasons),
        PodPhase::Running | PodPhase::Succeeded => {}
    }
}

/// Pending analysis. A pod pending longer than the threshold gets a single
/// long-term reason and no further inspection; otherwise scheduling and
/// initialization conditions are checked first, then the pending-specific
/// container waiting reasons.
fn pending_reasons(
    pod: &Pod,
    now: DateTime<Utc>,
    pending_threshold: Duration,
    reasons: &mut BTreeSet<String>,
) {
    match &pod.metadata.creation_timestamp {
        Some(ts) => match parse_k8s_time(ts) {
            Some(created) => {
                let pending_for = now - created;
                if pending_for > pending_threshold {
                    reasons.insert(format!(
                        "Phase: Long-term Pending ({:.1} min)",
                        pending_for.num_seconds() as f64 / 60.0
                    ));
                    return;
                }
            }
            None => {
                reasons.insert("Phase: Pending - Could not parse creation timestamp".to_string());
                return;
            }
        },
        None => {}
    }

    let mut condition_matched = false;
    for condition in &pod.status.conditions {
        if condition.status != "False" {
            continue;
        }
        match condition.condition_type.as_str() {
            "PodScheduled" => {
                reasons.insert(format!(
                    "Phase: Pending - Not Scheduled ({}: {})",
                    condition.reason, condition.message
                ));
                condition_matched = true;
            }
            "Initialized" => {
                reasons.insert(format!(
                    "Phase: Pending - Not Initialized ({}: {})",
                    condition.reason, condition.message
                ));
                condition_matched = true;
            }
            _ => {}
        }
    }
    if condition_matched {
        return;
    }

    for cs in &pod.status.container_statuses {
        if let Some(waiting) = &cs.state.waiting {
            if PENDING_WAITING_REASONS.contains(&waiting.reason.as_str()) {
                reasons.insert(format!(
                    "Phase: Pending - Container Waiting ({}: {})",
                    waiting.reason, waiting.message
                ));
            }
        }
    }
}

fn container_reasons(pod: &Pod, reasons: &mut BTreeSet<String>) {
    for cs in &pod.status.container_statuses {
        if let Some(waiting) = &cs.state.waiting {
            if !waiting.reason.is_empty() {
                let mut text = format!("Container '{}' Waiting: {}", cs.name, waiting.reason);
                if !waiting.message.is_empty() {
                    text.push_str(&format!(" - {}", waiting.message));
                }
                reasons.insert(text);
            }
        }

        if let Some(terminated) = &cs.state.terminated {
            let flagged = terminated.exit_code != 0
                || terminated.reason == "Error"
                || terminated.reason == "OOMKilled";
            if flagged {
                let reason = if terminated.reason.is_empty() {
                    "Unknown"
                } else {
                    terminated.reason.as_str()
                };
                let mut text = format!(
                    "Container '{}' Terminated: {} (Exit Code: {})",
                    cs.name, reason, terminated.exit_code
                );
                if !terminated.message.is_empty() {
                    text.push_str(&format!(" - {}", terminated.message));
                }
                reasons.insert(text);
            }
        }

        if cs.restart_count > 0 {
            reasons.insert(format!("Restarts({})", cs.restart_count));
        }

        if !cs.ready && cs.state.waiting.is_none() && cs.state.terminated.is_none() {
            let current = if cs.state.running.is_some() {
                "Running"
            } else {
                "Unknown"
            };
            reasons.insert(format!(
                "Container '{}' Not Ready (Current State: {current})",
                cs.name
            ));
        }
    }
}
