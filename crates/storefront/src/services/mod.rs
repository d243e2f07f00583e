//! Business logic behind the HTTP handlers.
//!
//! - [`orders`]: tracking lookups, admin listing and updates
//! - [`notifications`]: order lifecycle emails
//! - [`email`]: mail transport

pub mod email;
pub mod notifications;
pub mod orders;

pub use email::{Mailer, OutboxMailer, SmtpMailer};
pub use notifications::{DeliveryReport, DispatchOutcome, OrderEvent};
pub use orders::{OrderStats, TrackedOrder};
