//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET   /health                      - Liveness
//! GET   /health/ready                - Readiness (order store reachable)
//!
//! POST  /api/contact                 - Contact form (rate limited)
//! GET   /api/orders/track            - Order tracking by reference + email
//! POST  /api/orders/email            - Order lifecycle email (rate limited)
//!
//! # Admin (rate limited, x-admin-auth)
//! GET   /api/admin/orders            - Order listing with stats
//! PATCH /api/admin/orders/{orderRef} - Status and fulfilment update
//! ```

pub mod api;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the order API routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/track", get(api::orders::track))
        .route("/email", post(api::orders::send_email))
}

/// Create the admin API routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(api::admin::list_orders))
        .route("/orders/{order_ref}", patch(api::admin::update_order))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/api/contact", post(api::contact::submit))
        .nest("/api/orders", order_routes())
        .nest("/api/admin", admin_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the order store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.orders().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
