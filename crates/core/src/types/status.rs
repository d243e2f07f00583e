//! Order lifecycle status.
//!
//! ```text
//! pending_payment -> payment_received -> processing -> ordered -> shipped -> delivered
//!        \________________\_________________\___________\__________\
//!                                                                    -> cancelled
//! ```
//!
//! Forward moves may skip steps (an admin can mark a paid order straight as
//! `ordered`). `cancelled` is reachable from every non-terminal state.
//! `delivered` and `cancelled` are terminal.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout, awaiting bank transfer or card capture.
    #[default]
    PendingPayment,
    PaymentReceived,
    /// Being picked or awaiting supplier stock.
    Processing,
    /// Placed with the supplier.
    Ordered,
    Shipped,
    Delivered,
    Cancelled,
}

/// Returned when a status string is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

/// Returned when an order cannot move between two statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move order from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    /// Every status, in lifecycle order with `Cancelled` last.
    pub const ALL: [Self; 7] = [
        Self::PendingPayment,
        Self::PaymentReceived,
        Self::Processing,
        Self::Ordered,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// The wire/database name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::PaymentReceived => "payment_received",
            Self::Processing => "processing",
            Self::Ordered => "ordered",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable label for emails and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingPayment => "Awaiting payment",
            Self::PaymentReceived => "Payment received",
            Self::Processing => "Processing",
            Self::Ordered => "Ordered from supplier",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether the order can no longer change status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Position along the forward lifecycle; `None` for `Cancelled`.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::PendingPayment => Some(0),
            Self::PaymentReceived => Some(1),
            Self::Processing => Some(2),
            Self::Ordered => Some(3),
            Self::Shipped => Some(4),
            Self::Delivered => Some(5),
            Self::Cancelled => None,
        }
    }

    /// Whether an order in `self` may move to `next`.
    ///
    /// Staying on the same status is not a transition and returns `false`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    /// Validate a move to `next`, returning the new status.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the move is not allowed.
    pub fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownOrderStatus(s.to_string()))
    }
}
