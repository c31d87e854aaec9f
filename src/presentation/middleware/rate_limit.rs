//! Rate Limiting Middleware
//!
//! Per-address token buckets in front of every HTTP route, the socket
//! upgrade included. Rejected requests get a 429 with `Retry-After`.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::shared::error::AppError;
use crate::startup::AppState;

/// Admit or reject a request by client address.
pub async fn rate_limit_http(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key(&request);

    if state.http_limiter.allow(&key) {
        return next.run(request).await;
    }

    tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
    too_many_requests(state.http_limiter.retry_after_secs())
}

/// Remote IP, or one shared bucket when the server runs without connection info.
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

fn too_many_requests(retry_after: u64) -> Response {
    let mut response = AppError::RateLimited.into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}
