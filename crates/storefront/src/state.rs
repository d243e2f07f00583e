//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::OrderStore;
use crate::middleware::RateLimiter;
use crate::services::email::Mailer;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The order store and mailer
/// are trait objects so tests can swap in in-memory versions.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    orders: Arc<dyn OrderStore>,
    mailer: Arc<dyn Mailer>,
    rate_limiter: RateLimiter,
}

impl AppState {
    /// Create a new application state with a fresh rate limiter.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        orders: Arc<dyn OrderStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self::with_rate_limiter(config, orders, mailer, RateLimiter::new())
    }

    #[must_use]
    pub fn with_rate_limiter(
        config: StorefrontConfig,
        orders: Arc<dyn OrderStore>,
        mailer: Arc<dyn Mailer>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                orders,
                mailer,
                rate_limiter,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn orders(&self) -> &dyn OrderStore {
        self.inner.orders.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }
}
