//! Core types for PartsBin.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod order;
pub mod status;
pub mod user;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use order::{Address, AmountOverflow, Order, OrderItem};
pub use status::*;
pub use user::{SavedAddress, User};
