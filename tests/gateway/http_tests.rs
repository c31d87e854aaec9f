//! HTTP Layer Tests
//!
//! The middleware stack on a small router, without storage behind it.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

use dm_gateway::config::CorsSettings;
use dm_gateway::infrastructure::metrics::gather_metrics;
use dm_gateway::presentation::middleware::{create_cors_layer, track_metrics};

fn app(origins: &[&str]) -> Router {
    let cors = CorsSettings {
        allowed_origins: origins.iter().map(|o| o.to_string()).collect(),
    };
    Router::new()
        .route("/conversations/{id}/messages", get(|| async { "[]" }))
        .layer(middleware::from_fn(track_metrics))
        .layer(create_cors_layer(&cors))
}

#[tokio::test]
async fn test_preflight_allows_configured_origin() {
    let response = app(&["https://chat.example.com"])
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/conversations/5/messages")
                .header(header::ORIGIN, "https://chat.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://chat.example.com"
    );
}

#[tokio::test]
async fn test_unknown_origin_gets_no_cors_header() {
    let response = app(&["https://chat.example.com"])
        .oneshot(
            Request::builder()
                .uri("/conversations/5/messages")
                .header(header::ORIGIN, "https://evil.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_empty_origin_list_allows_any() {
    let response = app(&[])
        .oneshot(
            Request::builder()
                .uri("/conversations/5/messages")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_requests_are_counted_by_route_template() {
    let response = app(&[])
        .oneshot(
            Request::builder()
                .uri("/conversations/123456/messages")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let exported = gather_metrics();
    assert!(exported.contains(r#"path="/conversations/{id}/messages""#));
    assert!(!exported.contains("123456"));
}
