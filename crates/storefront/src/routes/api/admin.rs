//! Admin order endpoints.
//!
//! Every handler rate limits first, then checks `x-admin-auth`, before any
//! order data is read.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::HeaderMap,
};
use chrono::Utc;
use partsbin_core::{Order, OrderStatus};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::{ClientIp, RateLimitCategory, verify_admin};
use crate::services::notifications::{self, DispatchOutcome, OrderEvent};
use crate::services::orders::{self, OrderStats, OrderUpdate};
use crate::state::AppState;

/// Rate limit then authenticate an admin request.
fn authorize(state: &AppState, client: &ClientIp, headers: &HeaderMap) -> Result<()> {
    state
        .rate_limiter()
        .enforce(RateLimitCategory::Admin, client)?;

    verify_admin(headers, &state.config().admin).map_err(|e| {
        tracing::warn!(client = %client, reason = %e, "Admin authentication failed");
        AppError::from(e)
    })
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid status: {raw}")))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub orders: Vec<Order>,
    pub stats: OrderStats,
}

/// List orders with whole-table statistics.
///
/// GET /api/admin/orders?status=...&limit=...
///
/// `status=all` or an empty value means no filter.
#[instrument(skip_all, fields(client = %client))]
pub async fn list_orders(
    State(state): State<AppState>,
    client: ClientIp,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>> {
    authorize(&state, &client, &headers)?;

    let status = match query.status.as_deref().map(str::trim) {
        None | Some("" | "all") => None,
        Some(raw) => Some(parse_status(raw)?),
    };
    let limit = match query.limit.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<usize>()
                .map_err(|_| AppError::BadRequest(format!("Invalid limit: {raw}")))?,
        ),
    };

    let listing =
        orders::list_orders(state.orders(), status, orders::clamp_limit(limit)).await?;

    Ok(Json(ListResponse {
        success: true,
        orders: listing.orders,
        stats: listing.stats,
    }))
}

/// Body of `PATCH /api/admin/orders/{orderRef}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
    pub supplier_name: Option<String>,
    pub supplier_order_ref: Option<String>,
    pub notes: Option<String>,
    /// Email the customer about the new status.
    pub notify: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdateOrderResponse {
    pub success: bool,
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<DispatchOutcome>,
}

/// Update an order's status and fulfilment details.
///
/// PATCH /api/admin/orders/{orderRef}
#[instrument(skip_all, fields(client = %client, order_ref = %order_ref))]
pub async fn update_order(
    State(state): State<AppState>,
    client: ClientIp,
    headers: HeaderMap,
    Path(order_ref): Path<String>,
    payload: std::result::Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> Result<Json<UpdateOrderResponse>> {
    authorize(&state, &client, &headers)?;

    let Json(request) =
        payload.map_err(|_| AppError::BadRequest("Invalid request body".to_string()))?;
    let status = request
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_status)
        .transpose()?;

    let update = OrderUpdate {
        status,
        tracking_number: request.tracking_number,
        courier: request.courier,
        supplier_name: request.supplier_name,
        supplier_order_ref: request.supplier_order_ref,
        notes: request.notes,
    };
    let updated = orders::update_order(state.orders(), &order_ref, update, Utc::now()).await?;

    // The update is stored; a failed email is reported, never raised.
    let notification = match updated.entered {
        Some(entered) if request.notify => {
            match OrderEvent::for_status(&updated.order, entered) {
                Some(event) => Some(
                    notifications::dispatch(
                        state.mailer(),
                        &state.config().store,
                        &updated.order,
                        &event,
                    )
                    .await,
                ),
                None => None,
            }
        }
        _ => None,
    };

    Ok(Json(UpdateOrderResponse {
        success: true,
        order: updated.order,
        notification,
    }))
}
