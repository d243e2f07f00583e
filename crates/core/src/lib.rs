//! PartsBin Core - Shared types library.
//!
//! This crate provides the domain types used across the PartsBin components:
//! - `storefront` - Storefront API server (order tracking, notifications, admin listing)
//! - `cli` - Command-line tools for migrations and order reports
//!
//! # Architecture
//!
//! The core crate contains only types and pure domain rules - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, and emails, plus the order,
//!   status, and user models

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
