//! Order storage.
//!
//! # Database: `partsbin_storefront`
//!
//! ## Tables
//!
//! - `storefront.orders` - Orders written by checkout, updated by admin actions.
//!   Line items and the shipping address snapshot are JSONB; `order_ref`
//!   carries a unique index used for customer lookups.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p partsbin-cli -- migrate
//! ```
//!
//! Handlers talk to storage through [`OrderStore`]; [`PgOrderStore`] backs
//! production and [`MemoryOrderStore`] backs local development and tests.

pub mod memory;
pub mod orders;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use partsbin_core::{Order, OrderStatus};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use memory::MemoryOrderStore;
pub use orders::PgOrderStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The call did not finish within the outbound timeout.
    #[error("database call timed out after {0:?}")]
    Timeout(Duration),
}

/// The parts of an order a conditional write compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    pub status: OrderStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Revision {
    #[must_use]
    pub const fn of(order: &Order) -> Self {
        Self {
            status: order.status,
            updated_at: order.updated_at,
        }
    }
}

/// Storage for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Look an order up by its customer-facing reference.
    ///
    /// References are unique; if more than one record matches, the first is
    /// returned.
    async fn find_by_ref(&self, order_ref: &str) -> Result<Option<Order>, RepositoryError>;

    /// Every stored order, in no particular order.
    ///
    /// This is a full scan; callers sort and filter.
    async fn scan(&self) -> Result<Vec<Order>, RepositoryError>;

    /// Insert or replace an order, keyed by id.
    async fn save(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Replace a stored order only if it still matches `seen`.
    ///
    /// Returns `false`, storing nothing, when the order is gone or another
    /// writer changed its status or `updated_at` since it was read.
    async fn save_if_unchanged(
        &self,
        order: &Order,
        seen: Revision,
    ) -> Result<bool, RepositoryError>;

    /// Check the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `acquire_timeout` - How long to wait for a pooled connection
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(acquire_timeout)
        .connect(database_url.expose_secret())
        .await
}
