//! Route Configuration

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{
    auth_middleware, create_cors_layer, create_trace_layer, rate_limit_http, track_metrics,
};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(protected_routes(state.clone()))
        // Authenticates through the query string
        .route("/ws", get(ws_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_http,
        ))
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(track_metrics))
        .layer(create_trace_layer())
        .layer(create_cors_layer(&state.settings.cors))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::gather_metrics(),
    )
}

/// Routes behind the bearer token
fn protected_routes(state: AppState) -> Router<AppState> {
    let upload_limit = state.settings.attachments.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route(
            "/attachments",
            post(handlers::attachment::upload_image)
                .layer(DefaultBodyLimit::max(upload_limit))
                .delete(handlers::attachment::discard_image),
        )
        .route(
            "/conversations",
            get(handlers::conversation::list_conversations)
                .post(handlers::conversation::create_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            get(handlers::conversation::get_history),
        )
        .route("/messages/{id}", delete(handlers::message::delete_message))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
