pub mod api;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/data", get(api::handle_data))
        .route("/api/run-check", post(api::handle_run_check))
        .route(
            "/api/clusters/{cluster}/namespaces/{namespace}/pods/{pod}/events",
            get(api::handle_pod_events),
        )
        .route("/healthz", get(api::handle_healthz))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}
