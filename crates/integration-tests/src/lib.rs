//! Integration tests for the PartsBin storefront API.
//!
//! Tests drive the real router with `tower::ServiceExt::oneshot`; the order
//! store and mailer are in-memory so no database or SMTP server is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p partsbin-integration-tests
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header::CONTENT_TYPE},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{TimeZone, Utc};
use partsbin_core::{Address, Email, Money, Order, OrderId, OrderItem, OrderStatus};
use partsbin_storefront::{
    app,
    config::{AdminCredentials, SentryConfig, StoreConfig, StorefrontConfig},
    db::MemoryOrderStore,
    services::{Mailer, OutboxMailer},
    state::AppState,
};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "ops@partsbin.store";
pub const ADMIN_PASSWORD: &str = "Kq7!vR2#pLm9xZ4w";
pub const ADMIN_MAILBOX: &str = "orders@partsbin.store";
pub const CUSTOMER_EMAIL: &str = "buyer@example.com";

/// Address requests appear to come from unless overridden.
pub const DEFAULT_CLIENT_IP: &str = "198.51.100.10";

/// Configuration with in-memory fallbacks and fixed admin credentials.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: None,
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        store: StoreConfig {
            name: "PartsBin".to_string(),
            base_url: "https://partsbin.store".to_string(),
            admin_mailbox: email(ADMIN_MAILBOX),
        },
        admin: AdminCredentials {
            email: ADMIN_EMAIL.to_string(),
            password: SecretString::from(ADMIN_PASSWORD),
        },
        email: None,
        outbound_timeout: Duration::from_secs(10),
        json_logs: false,
        sentry: SentryConfig::default(),
    }
}

/// Parse a known-good address.
///
/// # Panics
///
/// Panics if `value` is not a valid email.
#[must_use]
pub fn email(value: &str) -> Email {
    Email::parse(value).expect("fixture email is valid")
}

/// A $993.00 order (CPU + 2x RAM + $16 shipping) for [`CUSTOMER_EMAIL`],
/// placed `minutes` after 2026-03-01 10:00 UTC.
///
/// # Panics
///
/// Never for the fixed fixture timestamp.
#[must_use]
pub fn order(order_ref: &str, status: OrderStatus, minutes: i64) -> Order {
    let created_at = Utc
        .with_ymd_and_hms(2026, 3, 1, 10, 0, 0)
        .single()
        .expect("fixture timestamp is valid")
        + chrono::Duration::minutes(minutes);

    Order {
        id: OrderId::generate(),
        order_ref: order_ref.to_string(),
        user_id: None,
        user_email: email(CUSTOMER_EMAIL),
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
        status,
        shipping_address: Address {
            name: "Alex Chen".to_string(),
            line1: "12 George St".to_string(),
            line2: Some("Level 3".to_string()),
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
        created_at,
        paid_at: None,
        ordered_at: None,
        shipped_at: None,
        delivered_at: None,
        updated_at: None,
    }
}

/// Value for a valid `x-admin-auth` header.
#[must_use]
pub fn admin_auth() -> String {
    STANDARD.encode(format!("{ADMIN_EMAIL}:{ADMIN_PASSWORD}"))
}

/// Decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// JSON body, or the raw text as a JSON string when it is not JSON.
    pub body: Value,
}

/// The storefront router over in-memory collaborators.
pub struct TestApp {
    router: Router,
    pub orders: Arc<MemoryOrderStore>,
    pub outbox: Arc<OutboxMailer>,
}

impl TestApp {
    /// App seeded with `orders`, sending mail to an in-memory outbox.
    #[must_use]
    pub fn new(orders: impl IntoIterator<Item = Order>) -> Self {
        let outbox = Arc::new(OutboxMailer::new());
        Self::build(orders, outbox.clone(), outbox)
    }

    /// App that sends mail through `mailer`. The outbox stays empty.
    #[must_use]
    pub fn with_mailer(orders: impl IntoIterator<Item = Order>, mailer: Arc<dyn Mailer>) -> Self {
        Self::build(orders, mailer, Arc::new(OutboxMailer::new()))
    }

    fn build(
        orders: impl IntoIterator<Item = Order>,
        mailer: Arc<dyn Mailer>,
        outbox: Arc<OutboxMailer>,
    ) -> Self {
        let store = Arc::new(MemoryOrderStore::with_orders(orders));
        let state = AppState::new(test_config(), store.clone(), mailer);
        Self {
            router: app(state),
            orders: store,
            outbox,
        }
    }

    /// Send a request from [`DEFAULT_CLIENT_IP`] unless it already carries
    /// `x-forwarded-for`.
    ///
    /// # Panics
    ///
    /// Panics if the router fails or the body cannot be read.
    pub async fn send(&self, mut request: Request<Body>) -> TestResponse {
        if !request.headers().contains_key("x-forwarded-for") {
            request.headers_mut().insert(
                "x-forwarded-for",
                DEFAULT_CLIENT_IP.parse().expect("valid header value"),
            );
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// GET `uri`.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(make_request(Method::GET, uri, None, &[])).await
    }

    /// POST `body` as JSON to `uri`.
    pub async fn post_json(&self, uri: &str, body: &Value) -> TestResponse {
        self.send(make_request(Method::POST, uri, Some(body), &[])).await
    }

    /// GET `uri` with valid admin credentials.
    pub async fn admin_get(&self, uri: &str) -> TestResponse {
        let auth = admin_auth();
        self.send(make_request(Method::GET, uri, None, &[("x-admin-auth", &auth)]))
            .await
    }

    /// PATCH `body` to `uri` with valid admin credentials.
    pub async fn admin_patch(&self, uri: &str, body: &Value) -> TestResponse {
        let auth = admin_auth();
        self.send(make_request(
            Method::PATCH,
            uri,
            Some(body),
            &[("x-admin-auth", &auth)],
        ))
        .await
    }
}

/// Build a request with optional JSON body and extra headers.
///
/// # Panics
///
/// Panics if `uri` or a header is invalid.
#[must_use]
pub fn make_request(method: Method, uri: &str, body: Option<&Value>, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("valid request")
}
