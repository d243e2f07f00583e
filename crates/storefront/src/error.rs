//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors become a JSON
//! `{"error": "..."}` body; server errors are captured to Sentry and answered
//! with a generic message.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;
use partsbin_core::AmountOverflow;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::middleware::AdminAuthError;
use crate::services::email::EmailError;
use crate::services::notifications::OrderEventError;
use crate::services::orders::OrderServiceError;

/// Application-level error type for the storefront API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Order store operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Sending mail failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or wrong admin credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is known but may not see the resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with the resource's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited { retry_after_secs: u64 },

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Email(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message safe to show the caller.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Email(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::RateLimited { .. } => "Too many requests, please try again later".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut response = (status, Json(json!({ "error": self.public_message() }))).into_response();

        if let Self::RateLimited { retry_after_secs } = self {
            let headers = response.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
            headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        }

        response
    }
}

impl From<OrderServiceError> for AppError {
    fn from(err: OrderServiceError) -> Self {
        match err {
            OrderServiceError::NotFound => Self::NotFound(err.to_string()),
            OrderServiceError::EmailMismatch => Self::Forbidden(err.to_string()),
            OrderServiceError::InvalidTransition(e) => {
                Self::Conflict(format!("Cannot change order status from {} to {}", e.from, e.to))
            }
            OrderServiceError::MissingTracking => Self::BadRequest(err.to_string()),
            OrderServiceError::Stale => Self::Conflict(err.to_string()),
            OrderServiceError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<AmountOverflow> for AppError {
    fn from(err: AmountOverflow) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<OrderEventError> for AppError {
    fn from(err: OrderEventError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<AdminAuthError> for AppError {
    fn from(_: AdminAuthError) -> Self {
        Self::Unauthorized("Unauthorized".to_string())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use partsbin_core::{OrderStatus, TransitionError};

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Order not found".to_string());
        assert_eq!(err.to_string(), "Not found: Order not found");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(get_status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AppError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            get_status(AppError::RateLimited { retry_after_secs: 5 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_server_errors_hide_detail() {
        let response = AppError::Internal("pool exhausted at 10.0.0.5".to_string()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_client_errors_carry_message() {
        let response = AppError::Forbidden("Email does not match order records".into()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "Email does not match order records");
    }

    #[test]
    fn test_rate_limited_headers() {
        let response = AppError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "42");
        assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "0");
    }

    #[test]
    fn test_order_errors_map_to_http() {
        let not_found: AppError = OrderServiceError::NotFound.into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let mismatch: AppError = OrderServiceError::EmailMismatch.into();
        assert_eq!(mismatch.status(), StatusCode::FORBIDDEN);

        let conflict: AppError = OrderServiceError::InvalidTransition(TransitionError {
            from: OrderStatus::Delivered,
            to: OrderStatus::Processing,
        })
        .into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let stale: AppError = OrderServiceError::Stale.into();
        assert_eq!(stale.status(), StatusCode::CONFLICT);
    }
}
