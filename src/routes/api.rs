use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::AppState;
use crate::clients::ClusterClient;
use crate::models::views::{DashboardView, SchedulerStatus};
use crate::scan::TriggerOutcome;

#[derive(Serialize)]
struct DataResponse<'a> {
    #[serde(flatten)]
    view: &'a DashboardView,
    background_status: SchedulerStatus,
}

/// The cached dashboard view. Never blocks on a running scan; before the
/// first cycle completes there is nothing to serve yet.
pub async fn handle_data(State(state): State<AppState>) -> Response {
    let background_status = state.orchestrator.status();
    match state.orchestrator.cached_view().await {
        Some(view) => Json(DataResponse {
            view: view.as_ref(),
            background_status,
        })
        .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "pending",
                "message": "initial scan has not completed yet",
                "background_status": background_status,
            })),
        )
            .into_response(),
    }
}

pub async fn handle_run_check(State(state): State<AppState>) -> Response {
    match state.orchestrator.clone().trigger_scan() {
        TriggerOutcome::Accepted => Json(json!({
            "status": "success",
            "message": "a new multi-cluster pod scan has been initiated",
        }))
        .into_response(),
        TriggerOutcome::AlreadyRunning => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "status": "error",
                "message": "a scan is already in progress",
            })),
        )
            .into_response(),
    }
}

/// On-demand event lookup for one pod, outside the scan cycle.
pub async fn handle_pod_events(
    State(state): State<AppState>,
    Path((cluster, namespace, pod)): Path<(String, String, String)>,
) -> Response {
    let Some(target) = state.targets.iter().find(|t| t.cluster == cluster) else {
        return (
            StatusCode::NOT_FOUND,
            format!("unknown cluster {cluster:?}"),
        )
            .into_response();
    };

    let client = match ClusterClient::connect(target, state.config.api_timeout()) {
        Ok(client) => client,
        Err(e) => return (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    };
    match client.list_pod_events(&namespace, &pod).await {
        Ok(events) => Json(events).into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

pub async fn handle_healthz() -> &'static str {
    "ok\n"
}
