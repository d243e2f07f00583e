//! Fixtures shared by unit tests.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use partsbin_core::{Address, Email, Money, Order, OrderId, OrderItem, OrderStatus};

use crate::config::StoreConfig;

pub fn store_config() -> StoreConfig {
    StoreConfig {
        name: "PartsBin".to_string(),
        base_url: "https://partsbin.store".to_string(),
        admin_mailbox: Email::parse("orders@partsbin.store").unwrap(),
    }
}

/// A $993.00 order (CPU + 2x RAM + $16 shipping) placed by `buyer@example.com`.
pub fn sample_order(order_ref: &str) -> Order {
    Order {
        id: OrderId::generate(),
        order_ref: order_ref.to_string(),
        user_id: None,
        user_email: Email::parse("buyer@example.com").unwrap(),
        items: vec![
            OrderItem {
                sku: "CPU-AMD-7800X3D".to_string(),
                name: "Ryzen 7 7800X3D".to_string(),
                brand: "AMD".to_string(),
                price: Money::from_cents(59_900),
                quantity: 1,
            },
            OrderItem {
                sku: "RAM-COR-32-6000".to_string(),
                name: "Vengeance 32GB DDR5-6000".to_string(),
                brand: "Corsair".to_string(),
                price: Money::from_cents(18_900),
                quantity: 2,
            },
        ],
        subtotal: Money::from_cents(97_700),
        shipping_cost: Money::from_cents(1_600),
        total: Money::from_cents(99_300),
        status: OrderStatus::PendingPayment,
        shipping_address: Address {
            name: "Alex Chen".to_string(),
            line1: "12 George St".to_string(),
            line2: None,
            city: "Sydney".to_string(),
            state: "NSW".to_string(),
            postcode: "2000".to_string(),
            country: "AU".to_string(),
            phone: Some("0400 000 000".to_string()),
        },
        supplier_name: None,
        supplier_order_ref: None,
        tracking_number: None,
        courier: None,
        notes: None,
        created_at: Utc
            .with_ymd_and_hms(2026, 3, 1, 10, 0, 0)
            .unwrap(),
        paid_at: None,
        ordered_at: None,
        shipped_at: None,
        delivered_at: None,
        updated_at: None,
    }
}
