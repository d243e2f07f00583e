//! Order lookup, listing and admin updates.

use chrono::{DateTime, Utc};
use partsbin_core::{Money, Order, OrderStatus, TransitionError};
use serde::Serialize;
use thiserror::Error;

use crate::db::{OrderStore, RepositoryError, Revision};

/// Default number of orders returned by the admin listing.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Upper bound on the admin listing page size.
pub const MAX_LIST_LIMIT: usize = 500;

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("Order not found")]
    NotFound,

    #[error("Email does not match order records")]
    EmailMismatch,

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Tracking number and courier are required to mark an order shipped")]
    MissingTracking,

    #[error("Order was changed by another request")]
    Stale,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// =============================================================================
// Tracking
// =============================================================================

/// Customer-safe view of an order.
///
/// Only these fields leave the server for unauthenticated lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedOrder {
    pub order_ref: String,
    pub status: OrderStatus,
    pub items: Vec<TrackedItem>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub ordered_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
    pub destination: Destination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedItem {
    pub name: String,
    pub brand: String,
    pub quantity: u32,
    pub price: Money,
}

/// Coarse shipping destination; no street address or phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub name: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

impl From<&Order> for TrackedOrder {
    fn from(order: &Order) -> Self {
        let address = &order.shipping_address;
        Self {
            order_ref: order.order_ref.clone(),
            status: order.status,
            items: order
                .items
                .iter()
                .map(|item| TrackedItem {
                    name: item.name.clone(),
                    brand: item.brand.clone(),
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            total: order.total,
            created_at: order.created_at,
            paid_at: order.paid_at,
            ordered_at: order.ordered_at,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
            tracking_number: order.tracking_number.clone(),
            courier: order.courier.clone(),
            destination: Destination {
                name: address.name.clone(),
                city: address.city.clone(),
                state: address.state.clone(),
                country: address.country.clone(),
            },
        }
    }
}

/// Look up an order for a customer who knows its reference and email.
///
/// # Errors
///
/// Returns `NotFound` for an unknown reference and `EmailMismatch` when the
/// email does not match the one on the order.
#[tracing::instrument(skip(store, email))]
pub async fn track_order(
    store: &dyn OrderStore,
    order_ref: &str,
    email: &str,
) -> Result<TrackedOrder, OrderServiceError> {
    let order = store
        .find_by_ref(order_ref.trim())
        .await?
        .ok_or(OrderServiceError::NotFound)?;

    if !order.belongs_to(email) {
        tracing::warn!(order_ref = %order.order_ref, "Tracking email mismatch");
        return Err(OrderServiceError::EmailMismatch);
    }

    Ok(TrackedOrder::from(&order))
}

// =============================================================================
// Listing
// =============================================================================

/// Order counts and revenue across the whole table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total: usize,
    pub pending_payment: usize,
    /// `payment_received`, `processing` and `ordered` combined.
    pub processing: usize,
    pub shipped: usize,
    pub delivered: usize,
    pub cancelled: usize,
    /// Sum of order totals, cancelled orders excluded.
    pub total_revenue: Money,
}

impl OrderStats {
    #[must_use]
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut stats = Self::default();
        for order in orders {
            stats.total += 1;
            match order.status {
                OrderStatus::PendingPayment => stats.pending_payment += 1,
                OrderStatus::PaymentReceived | OrderStatus::Processing | OrderStatus::Ordered => {
                    stats.processing += 1;
                }
                OrderStatus::Shipped => stats.shipped += 1,
                OrderStatus::Delivered => stats.delivered += 1,
                OrderStatus::Cancelled => stats.cancelled += 1,
            }
            if order.status != OrderStatus::Cancelled {
                stats.total_revenue = stats.total_revenue.saturating_add(order.total);
            }
        }
        stats
    }
}

/// One page of the admin listing.
#[derive(Debug, Clone, Serialize)]
pub struct OrderListing {
    pub orders: Vec<Order>,
    pub stats: OrderStats,
}

/// Clamp a requested page size into `1..=MAX_LIST_LIMIT`.
#[must_use]
pub fn clamp_limit(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

/// List orders newest first, optionally filtered by status.
///
/// Stats always cover every stored order regardless of `status` and `limit`.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
#[tracing::instrument(skip(store))]
pub async fn list_orders(
    store: &dyn OrderStore,
    status: Option<OrderStatus>,
    limit: usize,
) -> Result<OrderListing, OrderServiceError> {
    let all = store.scan().await?;
    let stats = OrderStats::from_orders(&all);

    let mut orders: Vec<Order> = all
        .into_iter()
        .filter(|order| status.is_none_or(|s| order.status == s))
        .collect();
    // Vec::sort_by is stable, so equal timestamps keep scan order.
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders.truncate(limit);

    Ok(OrderListing { orders, stats })
}

// =============================================================================
// Admin updates
// =============================================================================

/// Fields an admin may change on an order. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
    pub supplier_name: Option<String>,
    pub supplier_order_ref: Option<String>,
    pub notes: Option<String>,
}

/// Result of [`update_order`].
#[derive(Debug, Clone)]
pub struct UpdatedOrder {
    pub order: Order,
    /// The status the order moved into, if it changed.
    pub entered: Option<OrderStatus>,
}

/// Apply an admin update and store the result.
///
/// Setting the current status again is accepted and leaves the status and
/// its timestamps alone.
///
/// # Errors
///
/// Returns `NotFound`, `InvalidTransition` for an illegal status move, or
/// `MissingTracking` when moving to shipped without a tracking number and
/// courier, or `Stale` when another update landed between read and write.
/// Nothing is stored on error.
#[tracing::instrument(skip(store, update), fields(status = ?update.status))]
pub async fn update_order(
    store: &dyn OrderStore,
    order_ref: &str,
    update: OrderUpdate,
    now: DateTime<Utc>,
) -> Result<UpdatedOrder, OrderServiceError> {
    let mut order = store
        .find_by_ref(order_ref.trim())
        .await?
        .ok_or(OrderServiceError::NotFound)?;
    let seen = Revision::of(&order);

    let OrderUpdate {
        status,
        tracking_number,
        courier,
        supplier_name,
        supplier_order_ref,
        notes,
    } = update;

    if let Some(value) = non_blank(tracking_number) {
        order.tracking_number = Some(value);
    }
    if let Some(value) = non_blank(courier) {
        order.courier = Some(value);
    }
    if let Some(value) = supplier_name {
        order.supplier_name = Some(value);
    }
    if let Some(value) = supplier_order_ref {
        order.supplier_order_ref = Some(value);
    }
    if let Some(value) = notes {
        order.notes = Some(value);
    }

    let entered = match status {
        Some(next) if next != order.status => {
            if next == OrderStatus::Shipped && !order.has_tracking() {
                return Err(OrderServiceError::MissingTracking);
            }
            order.advance(next, now)?;
            Some(next)
        }
        _ => None,
    };
    order.updated_at = Some(now);

    if !store.save_if_unchanged(&order, seen).await? {
        tracing::warn!(order_ref = %order.order_ref, "Order changed during update");
        return Err(OrderServiceError::Stale);
    }
    tracing::info!(order_ref = %order.order_ref, status = %order.status, "Order updated");

    Ok(UpdatedOrder { order, entered })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::db::MemoryOrderStore;
    use crate::test_support::sample_order;

    fn order_with(order_ref: &str, status: OrderStatus, minutes: i64) -> Order {
        let mut order = sample_order(order_ref);
        order.status = status;
        order.created_at += Duration::minutes(minutes);
        order
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_track_order_matches_email_case_insensitively() {
        let store = MemoryOrderStore::with_orders([sample_order("REF123")]);
        let tracked = track_order(&store, "REF123", "  BUYER@Example.com ")
            .await
            .unwrap();
        assert_eq!(tracked.order_ref, "REF123");
        assert_eq!(tracked.destination.city, "Sydney");
    }

    #[tokio::test]
    async fn test_track_order_wrong_email_is_forbidden_not_missing() {
        let store = MemoryOrderStore::with_orders([sample_order("REF123")]);
        let err = track_order(&store, "REF123", "other@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, OrderServiceError::EmailMismatch));
    }

    #[tokio::test]
    async fn test_track_order_unknown_reference() {
        let store = MemoryOrderStore::with_orders([sample_order("REF123")]);
        let err = track_order(&store, "NOPE", "buyer@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, OrderServiceError::NotFound));
    }

    #[test]
    fn test_tracked_order_omits_private_fields() {
        let mut order = sample_order("REF1");
        order.notes = Some("fragile".to_string());
        order.supplier_order_ref = Some("SUP-9".to_string());

        let json = serde_json::to_value(TrackedOrder::from(&order)).unwrap();
        let obj = json.as_object().unwrap();
        for hidden in ["notes", "supplierOrderRef", "userId", "userEmail", "shippingAddress"] {
            assert!(!obj.contains_key(hidden), "{hidden} leaked");
        }
        assert!(json["items"][0].get("sku").is_none());
        assert!(json["destination"].get("line1").is_none());
        assert!(json["destination"].get("phone").is_none());
        assert_eq!(json["destination"]["state"], "NSW");
    }

    #[test]
    fn test_stats_buckets_reconcile() {
        let orders = [
            order_with("A", OrderStatus::PendingPayment, 0),
            order_with("B", OrderStatus::PaymentReceived, 1),
            order_with("C", OrderStatus::Processing, 2),
            order_with("D", OrderStatus::Ordered, 3),
            order_with("E", OrderStatus::Shipped, 4),
            order_with("F", OrderStatus::Delivered, 5),
            order_with("G", OrderStatus::Cancelled, 6),
        ];
        let stats = OrderStats::from_orders(&orders);

        assert_eq!(stats.total, 7);
        assert_eq!(stats.processing, 3);
        assert_eq!(
            stats.total,
            stats.pending_payment
                + stats.processing
                + stats.shipped
                + stats.delivered
                + stats.cancelled
        );
        // Seven orders at $993.00, one cancelled.
        assert_eq!(stats.total_revenue, Money::from_cents(6 * 99_300));
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 100);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(25)), 25);
        assert_eq!(clamp_limit(Some(10_000)), 500);
    }

    #[tokio::test]
    async fn test_list_orders_sorts_filters_and_truncates() {
        let store = MemoryOrderStore::with_orders([
            order_with("OLD", OrderStatus::Shipped, 0),
            order_with("MID", OrderStatus::PendingPayment, 10),
            order_with("NEW", OrderStatus::Shipped, 20),
        ]);

        let listing = list_orders(&store, None, 2).await.unwrap();
        let refs: Vec<_> = listing.orders.iter().map(|o| o.order_ref.as_str()).collect();
        assert_eq!(refs, ["NEW", "MID"]);
        assert_eq!(listing.stats.total, 3);

        let shipped = list_orders(&store, Some(OrderStatus::Shipped), 100)
            .await
            .unwrap();
        let refs: Vec<_> = shipped.orders.iter().map(|o| o.order_ref.as_str()).collect();
        assert_eq!(refs, ["NEW", "OLD"]);
        assert_eq!(shipped.stats.total, 3);
        assert_eq!(shipped.stats.pending_payment, 1);
    }

    #[tokio::test]
    async fn test_update_order_advances_and_stamps() {
        let store = MemoryOrderStore::with_orders([sample_order("PB-1")]);
        let update = OrderUpdate {
            status: Some(OrderStatus::PaymentReceived),
            notes: Some("paid by bank transfer".to_string()),
            ..OrderUpdate::default()
        };

        let updated = update_order(&store, "PB-1", update, now()).await.unwrap();

        assert_eq!(updated.entered, Some(OrderStatus::PaymentReceived));
        assert_eq!(updated.order.paid_at, Some(now()));
        assert_eq!(updated.order.updated_at, Some(now()));
        let stored = store.find_by_ref("PB-1").await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::PaymentReceived);
        assert_eq!(stored.notes.as_deref(), Some("paid by bank transfer"));
    }

    #[tokio::test]
    async fn test_update_order_same_status_is_noop() {
        let store = MemoryOrderStore::with_orders([sample_order("PB-1")]);
        let update = OrderUpdate {
            status: Some(OrderStatus::PendingPayment),
            ..OrderUpdate::default()
        };

        let updated = update_order(&store, "PB-1", update, now()).await.unwrap();
        assert_eq!(updated.entered, None);
        assert_eq!(updated.order.status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_update_order_rejects_backward_move() {
        let store =
            MemoryOrderStore::with_orders([order_with("PB-1", OrderStatus::Delivered, 0)]);
        let update = OrderUpdate {
            status: Some(OrderStatus::Processing),
            ..OrderUpdate::default()
        };

        let err = update_order(&store, "PB-1", update, now()).await.unwrap_err();
        assert!(matches!(err, OrderServiceError::InvalidTransition(_)));
        let stored = store.find_by_ref("PB-1").await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_update_order_shipping_requires_tracking() {
        let store =
            MemoryOrderStore::with_orders([order_with("PB-1", OrderStatus::Ordered, 0)]);
        let missing = OrderUpdate {
            status: Some(OrderStatus::Shipped),
            tracking_number: Some("TRK1".to_string()),
            courier: Some("   ".to_string()),
            ..OrderUpdate::default()
        };
        let err = update_order(&store, "PB-1", missing, now()).await.unwrap_err();
        assert!(matches!(err, OrderServiceError::MissingTracking));

        let complete = OrderUpdate {
            status: Some(OrderStatus::Shipped),
            tracking_number: Some("TRK1".to_string()),
            courier: Some("StarTrack".to_string()),
            ..OrderUpdate::default()
        };
        let updated = update_order(&store, "PB-1", complete, now()).await.unwrap();
        assert_eq!(updated.order.shipped_at, Some(now()));
        assert_eq!(updated.order.courier.as_deref(), Some("StarTrack"));
    }

    /// Store whose reads return only once both updaters have read.
    struct LockstepReads {
        inner: MemoryOrderStore,
        barrier: tokio::sync::Barrier,
    }

    #[async_trait::async_trait]
    impl OrderStore for LockstepReads {
        async fn find_by_ref(&self, order_ref: &str) -> Result<Option<Order>, RepositoryError> {
            let order = self.inner.find_by_ref(order_ref).await;
            self.barrier.wait().await;
            order
        }

        async fn scan(&self) -> Result<Vec<Order>, RepositoryError> {
            self.inner.scan().await
        }

        async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
            self.inner.save(order).await
        }

        async fn save_if_unchanged(
            &self,
            order: &Order,
            seen: Revision,
        ) -> Result<bool, RepositoryError> {
            self.inner.save_if_unchanged(order, seen).await
        }

        async fn ping(&self) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_updates_cannot_both_win() {
        let store = LockstepReads {
            inner: MemoryOrderStore::with_orders([order_with("PB-1", OrderStatus::Ordered, 0)]),
            barrier: tokio::sync::Barrier::new(2),
        };
        let cancel = OrderUpdate {
            status: Some(OrderStatus::Cancelled),
            ..OrderUpdate::default()
        };
        let ship = OrderUpdate {
            status: Some(OrderStatus::Shipped),
            tracking_number: Some("TRK1".to_string()),
            courier: Some("StarTrack".to_string()),
            ..OrderUpdate::default()
        };

        let (cancelled, shipped) = tokio::join!(
            update_order(&store, "PB-1", cancel, now()),
            update_order(&store, "PB-1", ship, now() + Duration::seconds(1)),
        );

        let stored = store.inner.find_by_ref("PB-1").await.unwrap().unwrap();
        match (cancelled, shipped) {
            (Ok(won), Err(OrderServiceError::Stale)) | (Err(OrderServiceError::Stale), Ok(won)) => {
                assert_eq!(stored.status, won.order.status);
            }
            (a, b) => panic!("expected exactly one stale update, got {a:?} and {b:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_order_unknown_reference() {
        let store = MemoryOrderStore::new();
        let err = update_order(&store, "NOPE", OrderUpdate::default(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderServiceError::NotFound));
    }
}
