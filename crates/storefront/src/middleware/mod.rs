//! HTTP middleware stack for the storefront API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (correlation id on span, Sentry scope and response)
//! 4. Security headers
//!
//! Rate limiting and admin auth run inside handlers, in that order, so a
//! rejected request never touches the order store.

pub mod admin_auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use admin_auth::{ADMIN_AUTH_HEADER, AdminAuthError, verify_admin};
pub use rate_limit::{
    ClientIp, RateLimitCategory, RateLimitConfig, RateLimitDecision, RateLimiter,
};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use security_headers::security_headers_middleware;
