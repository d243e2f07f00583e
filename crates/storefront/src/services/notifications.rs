//! Order status emails.
//!
//! Rendering is a pure function of the order and event; only
//! [`dispatch`] touches the mail transport. Customer and admin sends are
//! independent: each gets its own [`DeliveryReport`].

use askama::Template;
use partsbin_core::{Email, Money, Order, OrderStatus};
use serde::Serialize;
use thiserror::Error;

use crate::config::StoreConfig;
use crate::services::email::{EmailError, Mailer, OutgoingEmail, RenderedEmail};

/// Order lifecycle event that triggers a customer email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEvent {
    /// Order placed. Also notifies the admin mailbox.
    Confirmation,
    Payment,
    Shipping(ShipmentDetails),
    Delivered,
}

/// Carrier details included in the shipping email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentDetails {
    pub tracking_number: String,
    pub courier: String,
}

impl ShipmentDetails {
    /// Both fields must be present and non-blank.
    #[must_use]
    pub fn new(tracking_number: Option<&str>, courier: Option<&str>) -> Option<Self> {
        let tracking_number = tracking_number.map(str::trim).filter(|v| !v.is_empty())?;
        let courier = courier.map(str::trim).filter(|v| !v.is_empty())?;
        Some(Self {
            tracking_number: tracking_number.to_string(),
            courier: courier.to_string(),
        })
    }
}

/// Why an event could not be built from request input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderEventError {
    #[error("Invalid email type: {0}")]
    UnknownType(String),
    #[error("Tracking number and courier are required for shipping emails")]
    MissingShipment,
}

impl OrderEvent {
    /// Build an event from its wire name plus the optional shipping fields.
    ///
    /// # Errors
    ///
    /// Returns [`OrderEventError::UnknownType`] for an unrecognised name and
    /// [`OrderEventError::MissingShipment`] for `shipping` without both a
    /// tracking number and courier.
    pub fn parse(
        kind: &str,
        tracking_number: Option<&str>,
        courier: Option<&str>,
    ) -> Result<Self, OrderEventError> {
        match kind.trim() {
            "confirmation" => Ok(Self::Confirmation),
            "payment" => Ok(Self::Payment),
            "delivered" => Ok(Self::Delivered),
            "shipping" => ShipmentDetails::new(tracking_number, courier)
                .map(Self::Shipping)
                .ok_or(OrderEventError::MissingShipment),
            other => Err(OrderEventError::UnknownType(other.to_string())),
        }
    }

    /// The customer email that announces `order` entering `status`, if any.
    ///
    /// Shipping uses the tracking details recorded on the order.
    #[must_use]
    pub fn for_status(order: &Order, status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::PaymentReceived => Some(Self::Payment),
            OrderStatus::Shipped => {
                ShipmentDetails::new(order.tracking_number.as_deref(), order.courier.as_deref())
                    .map(Self::Shipping)
            }
            OrderStatus::Delivered => Some(Self::Delivered),
            _ => None,
        }
    }

    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation",
            Self::Payment => "payment",
            Self::Shipping(_) => "shipping",
            Self::Delivered => "delivered",
        }
    }
}

// =============================================================================
// Template views
// =============================================================================

/// One order line, pre-formatted for templates.
#[derive(Debug, Clone)]
struct LineView {
    name: String,
    brand: String,
    quantity: u32,
    unit_price: String,
    line_total: String,
}

/// Order fields pre-formatted for templates.
#[derive(Debug, Clone)]
struct OrderView {
    order_ref: String,
    customer_name: String,
    customer_email: String,
    placed_on: String,
    lines: Vec<LineView>,
    item_count: u64,
    subtotal: String,
    shipping: String,
    total: String,
    address_lines: Vec<String>,
    tracking_url: String,
}

impl OrderView {
    fn new(store: &StoreConfig, order: &Order) -> Self {
        let address = &order.shipping_address;
        let mut address_lines = vec![address.name.clone(), address.line1.clone()];
        if let Some(line2) = address.line2.as_deref().filter(|l| !l.trim().is_empty()) {
            address_lines.push(line2.to_string());
        }
        address_lines.push(format!(
            "{} {} {}",
            address.city, address.state, address.postcode
        ));
        address_lines.push(address.country.clone());

        let shipping = if order.shipping_cost == Money::ZERO {
            "Free".to_string()
        } else {
            order.shipping_cost.to_string()
        };

        Self {
            order_ref: order.order_ref.clone(),
            customer_name: address.name.clone(),
            customer_email: order.user_email.to_string(),
            placed_on: order.created_at.format("%-d %B %Y").to_string(),
            lines: order
                .items
                .iter()
                .map(|item| LineView {
                    name: item.name.clone(),
                    brand: item.brand.clone(),
                    quantity: item.quantity,
                    unit_price: item.price.to_string(),
                    line_total: item
                        .line_total()
                        .map(|total| total.to_string())
                        .unwrap_or_default(),
                })
                .collect(),
            item_count: order.item_count(),
            subtotal: order.subtotal.to_string(),
            shipping,
            total: order.total.to_string(),
            address_lines,
            tracking_url: store.tracking_url(&order.order_ref),
        }
    }
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct ConfirmationHtml<'a> {
    store_name: &'a str,
    order: &'a OrderView,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct ConfirmationText<'a> {
    store_name: &'a str,
    order: &'a OrderView,
}

#[derive(Template)]
#[template(path = "email/payment_received.html")]
struct PaymentHtml<'a> {
    store_name: &'a str,
    order: &'a OrderView,
}

#[derive(Template)]
#[template(path = "email/payment_received.txt")]
struct PaymentText<'a> {
    store_name: &'a str,
    order: &'a OrderView,
}

#[derive(Template)]
#[template(path = "email/order_shipped.html")]
struct ShippedHtml<'a> {
    store_name: &'a str,
    order: &'a OrderView,
    shipment: &'a ShipmentDetails,
}

#[derive(Template)]
#[template(path = "email/order_shipped.txt")]
struct ShippedText<'a> {
    store_name: &'a str,
    order: &'a OrderView,
    shipment: &'a ShipmentDetails,
}

#[derive(Template)]
#[template(path = "email/order_delivered.html")]
struct DeliveredHtml<'a> {
    store_name: &'a str,
    order: &'a OrderView,
}

#[derive(Template)]
#[template(path = "email/order_delivered.txt")]
struct DeliveredText<'a> {
    store_name: &'a str,
    order: &'a OrderView,
}

#[derive(Template)]
#[template(path = "email/admin_new_order.html")]
struct AdminNewOrderHtml<'a> {
    store_name: &'a str,
    order: &'a OrderView,
}

#[derive(Template)]
#[template(path = "email/admin_new_order.txt")]
struct AdminNewOrderText<'a> {
    store_name: &'a str,
    order: &'a OrderView,
}

// =============================================================================
// Rendering
// =============================================================================

/// Render the customer email for `event`.
///
/// # Errors
///
/// Returns an error if a template fails to render.
pub fn render_customer_email(
    store: &StoreConfig,
    order: &Order,
    event: &OrderEvent,
) -> Result<RenderedEmail, askama::Error> {
    let view = OrderView::new(store, order);
    let order = &view;
    let store_name = store.name.as_str();

    let (subject, text, html) = match event {
        OrderEvent::Confirmation => (
            format!("Order Confirmed - {}", order.order_ref),
            ConfirmationText { store_name, order }.render()?,
            ConfirmationHtml { store_name, order }.render()?,
        ),
        OrderEvent::Payment => (
            format!("Payment Received - {}", order.order_ref),
            PaymentText { store_name, order }.render()?,
            PaymentHtml { store_name, order }.render()?,
        ),
        OrderEvent::Shipping(shipment) => (
            format!("Your Order Has Shipped - {}", order.order_ref),
            ShippedText {
                store_name,
                order,
                shipment,
            }
            .render()?,
            ShippedHtml {
                store_name,
                order,
                shipment,
            }
            .render()?,
        ),
        OrderEvent::Delivered => (
            format!("Order Delivered - {}", order.order_ref),
            DeliveredText { store_name, order }.render()?,
            DeliveredHtml { store_name, order }.render()?,
        ),
    };

    Ok(RenderedEmail {
        subject,
        text,
        html,
    })
}

/// Render the new-order notification for the admin mailbox.
///
/// # Errors
///
/// Returns an error if a template fails to render.
pub fn render_admin_notification(
    store: &StoreConfig,
    order: &Order,
) -> Result<RenderedEmail, askama::Error> {
    let view = OrderView::new(store, order);
    let store_name = store.name.as_str();

    Ok(RenderedEmail {
        subject: format!("New Order: {} ({})", view.order_ref, view.total),
        text: AdminNewOrderText {
            store_name,
            order: &view,
        }
        .render()?,
        html: AdminNewOrderHtml {
            store_name,
            order: &view,
        }
        .render()?,
    })
}

// =============================================================================
// Dispatch
// =============================================================================

/// Outcome of one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryReport {
    const fn delivered() -> Self {
        Self {
            sent: true,
            error: None,
        }
    }

    fn failed() -> Self {
        Self {
            sent: false,
            error: Some("Failed to send email".to_string()),
        }
    }
}

/// Per-recipient results of [`dispatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub customer_email: DeliveryReport,
    /// Present only for events that notify the admin mailbox.
    pub admin_email: Option<DeliveryReport>,
}

/// Send the emails for `event`.
///
/// The customer always gets one email; `Confirmation` also sends the admin
/// notification. A failure on one send never affects the other.
pub async fn dispatch(
    mailer: &dyn Mailer,
    store: &StoreConfig,
    order: &Order,
    event: &OrderEvent,
) -> DispatchOutcome {
    let customer_email = deliver(
        mailer,
        &order.user_email,
        render_customer_email(store, order, event),
        event.name(),
    )
    .await;

    let admin_email = match event {
        OrderEvent::Confirmation => Some(
            deliver(
                mailer,
                &store.admin_mailbox,
                render_admin_notification(store, order),
                "admin_new_order",
            )
            .await,
        ),
        _ => None,
    };

    DispatchOutcome {
        customer_email,
        admin_email,
    }
}

async fn deliver(
    mailer: &dyn Mailer,
    to: &Email,
    rendered: Result<RenderedEmail, askama::Error>,
    kind: &'static str,
) -> DeliveryReport {
    let result = match rendered {
        Ok(rendered) => mailer.send(OutgoingEmail::new(to.clone(), rendered)).await,
        Err(e) => Err(EmailError::from(e)),
    };

    match result {
        Ok(()) => DeliveryReport::delivered(),
        Err(e) => {
            tracing::error!(to = %to, kind, error = %e, "Failed to send order email");
            DeliveryReport::failed()
        }
    }
}
