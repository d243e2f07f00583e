//! Health checks and headers applied to every response.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use partsbin_integration_tests::{TestApp, make_request};

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new([]);

    let resp = app.get("/health").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "ok");

    let resp = app.get("/health/ready").await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let app = TestApp::new([]);
    let resp = app.get("/api/orders/track").await;

    assert_eq!(resp.headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(resp.headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(resp.headers.get("cache-control").unwrap(), "no-store");
}

#[tokio::test]
async fn test_request_id_generated_or_propagated() {
    let app = TestApp::new([]);

    let resp = app.get("/health").await;
    assert!(resp.headers.contains_key("x-request-id"));

    let request = make_request(Method::GET, "/health", None, &[("x-request-id", "edge-abc-123")]);
    let resp = app.send(request).await;
    assert_eq!(resp.headers.get("x-request-id").unwrap(), "edge-abc-123");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new([]);
    let resp = app.get("/api/products").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
