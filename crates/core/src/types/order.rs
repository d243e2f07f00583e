//! Order model.
//!
//! Orders are created by checkout, mutated by admin actions (status moves,
//! supplier and tracking details), and never deleted. Field names serialize
//! in camelCase to match the checkout payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Email, Money, OrderId, OrderStatus, TransitionError, UserId};

/// A single order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub sku: String,
    pub name: String,
    pub brand: String,
    /// Unit price.
    pub price: Money,
    pub quantity: u32,
}

impl OrderItem {
    /// Unit price times quantity, or `None` if the product overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// An order whose line totals cannot be computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Order amounts are out of range")]
pub struct AmountOverflow;


/// A postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Recipient name.
    pub name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    /// Customer-facing reference, e.g. `PB-20260114-7F3K`.
    pub order_ref: String,
    /// Absent for guest checkouts.
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub user_email: Email,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
    #[serde(default)]
    pub status: OrderStatus,
    /// Snapshot taken at checkout.
    pub shipping_address: Address,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub supplier_order_ref: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub courier: Option<String>,
    /// Internal staff notes. Never shown to customers.
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ordered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of line totals.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] if any line total or the running sum does
    /// not fit a decimal.
    pub fn lines_total(&self) -> Result<Money, AmountOverflow> {
        self.items.iter().try_fold(Money::ZERO, |acc, item| {
            item.line_total()
                .and_then(|line| acc.checked_add(line))
                .ok_or(AmountOverflow)
        })
    }

    /// Whether `email` matches the order's owner, ignoring case.
    #[must_use]
    pub fn belongs_to(&self, email: &str) -> bool {
        self.user_email.matches(email)
    }

    /// Whether both a tracking number and courier are recorded.
    #[must_use]
    pub fn has_tracking(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.tracking_number) && present(&self.courier)
    }

    /// Move the order to `next`, stamping the matching lifecycle timestamp.
    ///
    /// Lifecycle timestamps that are already set are kept. `updated_at` is
    /// always set to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the move is not allowed; the order is
    /// left untouched.
    pub fn advance(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.status = self.status.transition(next)?;

        let stamp = match next {
            OrderStatus::PaymentReceived => Some(&mut self.paid_at),
            OrderStatus::Ordered => Some(&mut self.ordered_at),
            OrderStatus::Shipped => Some(&mut self.shipped_at),
            OrderStatus::Delivered => Some(&mut self.delivered_at),
            OrderStatus::PendingPayment | OrderStatus::Processing | OrderStatus::Cancelled => None,
        };
        if let Some(slot) = stamp {
            slot.get_or_insert(now);
        }

        self.updated_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order {
            id: OrderId::generate(),
            order_ref: "PB-1001".to_string(),
            user_id: None,
            user_email: Email::parse("buyer@example.com").unwrap(),
            items: vec![
                OrderItem {
                    sku: "CPU-7800X3D".to_string(),
                    name: "Ryzen 7 7800X3D".to_string(),
                    brand: "AMD".to_string(),
                    price: Money::from_cents(59_900),
                    quantity: 1,
                },
                OrderItem {
                    sku: "RAM-32-6000".to_string(),
                    name: "32GB DDR5-6000".to_string(),
                    brand: "G.Skill".to_string(),
                    price: Money::from_cents(18_950),
                    quantity: 2,
                },
            ],
            subtotal: Money::from_cents(97_800),
            shipping_cost: Money::from_cents(1_500),
            total: Money::from_cents(99_300),
            status: OrderStatus::PendingPayment,
            shipping_address: Address {
                name: "Sam Buyer".to_string(),
                line1: "1 Example St".to_string(),
                line2: None,
                city: "Melbourne".to_string(),
                state: "VIC".to_string(),
                postcode: "3000".to_string(),
                country: "AU".to_string(),
                phone: None,
            },
            supplier_name: None,
            supplier_order_ref: None,
            tracking_number: None,
            courier: None,
            notes: None,
            created_at: Utc::now(),
            paid_at: None,
            ordered_at: None,
            shipped_at: None,
            delivered_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_item_count_and_line_totals() {
        let order = sample_order();
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.lines_total(), Ok(order.subtotal));
    }

    #[test]
    fn test_lines_total_reports_overflow() {
        let mut order = sample_order();
        order.items[0].price = Money::new(rust_decimal::Decimal::MAX);
        order.items[0].quantity = 2;
        assert_eq!(order.items[0].line_total(), None);
        assert_eq!(order.lines_total(), Err(AmountOverflow));

        order.items[0].quantity = 1;
        assert_eq!(order.lines_total(), Err(AmountOverflow));
    }

    #[test]
    fn test_item_count_does_not_wrap() {
        let mut order = sample_order();
        order.items[0].quantity = u32::MAX;
        order.items[1].quantity = u32::MAX;
        assert_eq!(order.item_count(), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn test_belongs_to_is_case_insensitive() {
        let order = sample_order();
        assert!(order.belongs_to("BUYER@example.com"));
        assert!(!order.belongs_to("someone@example.com"));
    }

    #[test]
    fn test_advance_stamps_timestamps_once() {
        let mut order = sample_order();
        let paid = Utc::now();
        order.advance(OrderStatus::PaymentReceived, paid).unwrap();
        assert_eq!(order.status, OrderStatus::PaymentReceived);
        assert_eq!(order.paid_at, Some(paid));
        assert_eq!(order.updated_at, Some(paid));

        let shipped = paid + chrono::Duration::days(2);
        order.advance(OrderStatus::Shipped, shipped).unwrap();
        assert_eq!(order.paid_at, Some(paid));
        assert_eq!(order.shipped_at, Some(shipped));
        assert_eq!(order.ordered_at, None);
    }

    #[test]
    fn test_advance_rejects_illegal_move_without_mutation() {
        let mut order = sample_order();
        order.status = OrderStatus::Delivered;
        let before = order.clone();
        assert!(order.advance(OrderStatus::Shipped, Utc::now()).is_err());
        assert_eq!(order, before);
    }

    #[test]
    fn test_has_tracking_requires_both_fields() {
        let mut order = sample_order();
        order.tracking_number = Some("TRK123".to_string());
        assert!(!order.has_tracking());
        order.courier = Some("  ".to_string());
        assert!(!order.has_tracking());
        order.courier = Some("Australia Post".to_string());
        assert!(order.has_tracking());
    }

    #[test]
    fn test_deserializes_checkout_payload() {
        let json = serde_json::json!({
            "id": "6f1c1f1e-8c43-4a8e-9a0b-3f7b0c4d2e11",
            "orderRef": "PB-2002",
            "userEmail": "buyer@example.com",
            "items": [{"sku": "GPU-1", "name": "RTX 4070", "brand": "NVIDIA", "price": 899.0, "quantity": 1}],
            "subtotal": 899.0,
            "shippingCost": 0,
            "total": 899.0,
            "status": "payment_received",
            "shippingAddress": {
                "name": "Sam", "line1": "1 St", "city": "Perth",
                "state": "WA", "postcode": "6000", "country": "AU"
            },
            "createdAt": "2026-01-14T09:30:00Z"
        });
        let order: Order = serde_json::from_value(json).unwrap();
        assert_eq!(order.status, OrderStatus::PaymentReceived);
        assert_eq!(order.total, Money::from_cents(89_900));
        assert!(order.paid_at.is_none());
    }
}
