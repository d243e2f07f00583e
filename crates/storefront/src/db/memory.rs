//! In-process order store for local development and tests.
//!
//! Orders are lost on restart.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use partsbin_core::{Order, OrderId};

use super::{OrderStore, RepositoryError, Revision};

/// Order store backed by a `HashMap` keyed by order id.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl MemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `orders`.
    #[must_use]
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let orders = orders.into_iter().map(|order| (order.id, order)).collect();
        Self {
            orders: RwLock::new(orders),
        }
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_ref(&self, order_ref: &str) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        Ok(orders
            .values()
            .find(|order| order.order_ref == order_ref)
            .cloned())
    }

    async fn scan(&self) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        Ok(orders.values().cloned().collect())
    }

    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        self.orders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(order.id, order.clone());
        Ok(())
    }

    async fn save_if_unchanged(
        &self,
        order: &Order,
        seen: Revision,
    ) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        match orders.get_mut(&order.id) {
            Some(current) if Revision::of(current) == seen => {
                current.clone_from(order);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
