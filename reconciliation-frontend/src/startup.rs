use axum::{
    middleware::from_fn,
    routing::{get, post, put},
    Router,
};
use service_core::middleware::tracing::request_id_middleware;
use service_core::observability::REQUEST_ID_HEADER;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::health_check,
    events::reconciliation_events,
    metrics::metrics,
    reconcile::{
        clear_allocations, close_session, get_view, match_full, open_session, panel_page,
        refresh_suggestions, set_allocation, submit,
    },
};
use crate::middleware::http_metrics::track_http_metrics;
use crate::reconcile::ReconcileService;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/reconcile", post(open_session))
        .route("/reconcile/:session_id", get(panel_page).delete(close_session))
        .route("/reconcile/:session_id/view", get(get_view))
        .route(
            "/reconcile/:session_id/allocations",
            put(set_allocation).delete(clear_allocations),
        )
        .route(
            "/reconcile/:session_id/allocations/match-full",
            post(match_full),
        )
        .route(
            "/reconcile/:session_id/suggestions/refresh",
            post(refresh_suggestions),
        )
        .route("/reconcile/:session_id/submit", post(submit))
        .route("/events/reconciliations", get(reconciliation_events))
        .route_layer(from_fn(track_http_metrics))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Periodically drop sessions that nobody has touched for `max_idle`.
pub fn spawn_session_sweeper(
    service: ReconcileService,
    every: Duration,
    max_idle: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // interval() panics on a zero period.
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            service.purge_idle(max_idle);
        }
    })
}
