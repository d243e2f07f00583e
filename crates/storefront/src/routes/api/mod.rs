//! JSON API handlers.

pub mod admin;
pub mod contact;
pub mod orders;
