//! `PostgreSQL` order repository.
//!
//! Queries are checked at runtime (`query_as`) so the crate builds without a
//! live database.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use partsbin_core::{Address, Email, Money, Order, OrderId, OrderItem, OrderStatus, UserId};

use super::{OrderStore, RepositoryError, Revision};

/// Row shape of `storefront.orders`.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_ref: String,
    user_id: Option<UserId>,
    user_email: String,
    items: Json<Vec<OrderItem>>,
    subtotal: Money,
    shipping_cost: Money,
    total: Money,
    status: OrderStatus,
    shipping_address: Json<Address>,
    supplier_name: Option<String>,
    supplier_order_ref: Option<String>,
    tracking_number: Option<String>,
    courier: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    ordered_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let user_email = Email::parse(&row.user_email).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "invalid email on order {}: {e}",
                row.order_ref
            ))
        })?;

        Ok(Self {
            id: row.id,
            order_ref: row.order_ref,
            user_id: row.user_id,
            user_email,
            items: row.items.0,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            total: row.total,
            status: row.status,
            shipping_address: row.shipping_address.0,
            supplier_name: row.supplier_name,
            supplier_order_ref: row.supplier_order_ref,
            tracking_number: row.tracking_number,
            courier: row.courier,
            notes: row.notes,
            created_at: row.created_at,
            paid_at: row.paid_at,
            ordered_at: row.ordered_at,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for order database operations.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgOrderStore {
    /// Create a new order repository. Every call is bounded by `timeout`.
    #[must_use]
    pub const fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Run a database future under the outbound timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RepositoryError::Timeout(self.timeout))?
            .map_err(RepositoryError::from)
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_ref(&self, order_ref: &str) -> Result<Option<Order>, RepositoryError> {
        let row = self
            .bounded(
                sqlx::query_as::<_, OrderRow>(
                    r"
                    SELECT id, order_ref, user_id, user_email, items, subtotal,
                           shipping_cost, total, status, shipping_address,
                           supplier_name, supplier_order_ref, tracking_number, courier,
                           notes, created_at, paid_at, ordered_at, shipped_at,
                           delivered_at, updated_at
                    FROM storefront.orders
                    WHERE order_ref = $1
                    LIMIT 1
                    ",
                )
                .bind(order_ref)
                .fetch_optional(&self.pool),
            )
            .await?;

        row.map(Order::try_from).transpose()
    }

    async fn scan(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = self
            .bounded(
                sqlx::query_as::<_, OrderRow>(
                    r"
                    SELECT id, order_ref, user_id, user_email, items, subtotal,
                           shipping_cost, total, status, shipping_address,
                           supplier_name, supplier_order_ref, tracking_number, courier,
                           notes, created_at, paid_at, ordered_at, shipped_at,
                           delivered_at, updated_at
                    FROM storefront.orders
                    ",
                )
                .fetch_all(&self.pool),
            )
            .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        self.bounded(
            sqlx::query(
                r"
                INSERT INTO storefront.orders (
                    id, order_ref, user_id, user_email, items, subtotal,
                    shipping_cost, total, status, shipping_address,
                    supplier_name, supplier_order_ref, tracking_number, courier,
                    notes, created_at, paid_at, ordered_at, shipped_at,
                    delivered_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                        $14, $15, $16, $17, $18, $19, $20, $21)
                ON CONFLICT (id) DO UPDATE SET
                    status = EXCLUDED.status,
                    supplier_name = EXCLUDED.supplier_name,
                    supplier_order_ref = EXCLUDED.supplier_order_ref,
                    tracking_number = EXCLUDED.tracking_number,
                    courier = EXCLUDED.courier,
                    notes = EXCLUDED.notes,
                    paid_at = EXCLUDED.paid_at,
                    ordered_at = EXCLUDED.ordered_at,
                    shipped_at = EXCLUDED.shipped_at,
                    delivered_at = EXCLUDED.delivered_at,
                    updated_at = EXCLUDED.updated_at
                ",
            )
            .bind(order.id)
            .bind(&order.order_ref)
            .bind(order.user_id)
            .bind(&order.user_email)
            .bind(Json(&order.items))
            .bind(order.subtotal)
            .bind(order.shipping_cost)
            .bind(order.total)
            .bind(order.status)
            .bind(Json(&order.shipping_address))
            .bind(&order.supplier_name)
            .bind(&order.supplier_order_ref)
            .bind(&order.tracking_number)
            .bind(&order.courier)
            .bind(&order.notes)
            .bind(order.created_at)
            .bind(order.paid_at)
            .bind(order.ordered_at)
            .bind(order.shipped_at)
            .bind(order.delivered_at)
            .bind(order.updated_at)
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn save_if_unchanged(
        &self,
        order: &Order,
        seen: Revision,
    ) -> Result<bool, RepositoryError> {
        let result = self
            .bounded(
                sqlx::query(
                    r"
                    UPDATE storefront.orders SET
                        status = $4,
                        supplier_name = $5,
                        supplier_order_ref = $6,
                        tracking_number = $7,
                        courier = $8,
                        notes = $9,
                        paid_at = $10,
                        ordered_at = $11,
                        shipped_at = $12,
                        delivered_at = $13,
                        updated_at = $14
                    WHERE id = $1
                      AND status = $2
                      AND updated_at IS NOT DISTINCT FROM $3
                    ",
                )
                .bind(order.id)
                .bind(seen.status)
                .bind(seen.updated_at)
                .bind(order.status)
                .bind(&order.supplier_name)
                .bind(&order.supplier_order_ref)
                .bind(&order.tracking_number)
                .bind(&order.courier)
                .bind(&order.notes)
                .bind(order.paid_at)
                .bind(order.ordered_at)
                .bind(order.shipped_at)
                .bind(order.delivered_at)
                .bind(order.updated_at)
                .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.bounded(sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map(|_| ())
    }
}
