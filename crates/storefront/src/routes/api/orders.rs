//! Customer-facing order endpoints: tracking lookup and status emails.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use partsbin_core::Order;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::{ClientIp, RateLimitCategory};
use crate::services::notifications::{self, DeliveryReport, OrderEvent};
use crate::services::orders::{self, TrackedOrder};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackQuery {
    pub order_ref: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub success: bool,
    pub order: TrackedOrder,
}

/// Look up an order by reference and email.
///
/// GET /api/orders/track?orderRef=...&email=...
#[instrument(skip_all, fields(order_ref = query.order_ref.as_deref().unwrap_or_default()))]
pub async fn track(
    State(state): State<AppState>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<TrackResponse>> {
    let order_ref = non_blank(query.order_ref);
    let email = non_blank(query.email);
    let (Some(order_ref), Some(email)) = (order_ref, email) else {
        return Err(AppError::BadRequest(
            "Order reference and email are required".to_string(),
        ));
    };

    let order = orders::track_order(state.orders(), &order_ref, &email).await?;

    Ok(Json(TrackResponse {
        success: true,
        order,
    }))
}

/// Body of `POST /api/orders/email`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub order: Option<Order>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub customer_email: DeliveryReport,
    pub admin_email: Option<DeliveryReport>,
}

/// Send the email for an order lifecycle event.
///
/// POST /api/orders/email
///
/// Responds 200 when the customer email went out, 500 when it did not.
/// The admin result is reported either way.
#[instrument(skip_all, fields(client = %client))]
pub async fn send_email(
    State(state): State<AppState>,
    client: ClientIp,
    payload: std::result::Result<Json<SendEmailRequest>, JsonRejection>,
) -> Result<Response> {
    state
        .rate_limiter()
        .enforce(RateLimitCategory::OrderEmail, &client)?;

    let Json(request) =
        payload.map_err(|_| AppError::BadRequest("Invalid request body".to_string()))?;
    let order = request
        .order
        .ok_or_else(|| AppError::BadRequest("Order is required".to_string()))?;
    order.lines_total()?;
    let kind = non_blank(request.kind)
        .ok_or_else(|| AppError::BadRequest("Email type is required".to_string()))?;
    let event = OrderEvent::parse(
        &kind,
        request.tracking_number.as_deref(),
        request.courier.as_deref(),
    )?;

    let outcome =
        notifications::dispatch(state.mailer(), &state.config().store, &order, &event).await;
    tracing::info!(
        order_ref = %order.order_ref,
        event = event.name(),
        customer_sent = outcome.customer_email.sent,
        "Order email dispatched"
    );

    let (status, error) = if outcome.customer_email.sent {
        (StatusCode::OK, None)
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Some("Failed to send customer email"),
        )
    };

    Ok((
        status,
        Json(SendEmailResponse {
            success: error.is_none(),
            error,
            customer_email: outcome.customer_email,
            admin_email: outcome.admin_email,
        }),
    )
        .into_response())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
