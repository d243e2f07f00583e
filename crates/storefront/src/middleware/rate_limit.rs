//! Fixed-window rate limiting keyed by client address.
//!
//! Limits are per process and advisory: a restart or a second instance
//! starts from zero. Endpoint categories:
//! - `contact`: 5 requests per 15 minutes
//! - `order-email`: 10 requests per minute
//! - `admin`: 60 requests per minute

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use rand::Rng;

use crate::error::AppError;

/// Chance that a call sweeps expired entries.
const CLEANUP_PROBABILITY: f64 = 0.01;

/// Window length and request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max: u32,
}

impl RateLimitConfig {
    pub const CONTACT: Self = Self {
        window: Duration::from_secs(15 * 60),
        max: 5,
    };

    pub const ORDER_EMAIL: Self = Self {
        window: Duration::from_secs(60),
        max: 10,
    };

    pub const ADMIN: Self = Self {
        window: Duration::from_secs(60),
        max: 60,
    };
}

/// Endpoint groups that share a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitCategory {
    Contact,
    OrderEmail,
    Admin,
}

impl RateLimitCategory {
    /// Prefix that namespaces this category's keys.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::OrderEmail => "order-email",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub const fn config(self) -> RateLimitConfig {
        match self {
            Self::Contact => RateLimitConfig::CONTACT,
            Self::OrderEmail => RateLimitConfig::ORDER_EMAIL,
            Self::Admin => RateLimitConfig::ADMIN,
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: Instant,
}

impl RateLimitDecision {
    /// Time left in the window, rounded up to whole seconds and at least 1.
    #[must_use]
    pub fn retry_after_secs(&self, now: Instant) -> u64 {
        let left = self.reset_at.saturating_duration_since(now);
        (left.as_secs() + u64::from(left.subsec_nanos() > 0)).max(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    reset_at: Instant,
}

/// Shared fixed-window counter map.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    cleanup_probability: f64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_cleanup_probability(CLEANUP_PROBABILITY)
    }

    /// Limiter whose expired-entry sweep runs with probability `p` per call.
    #[must_use]
    pub fn with_cleanup_probability(p: f64) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            cleanup_probability: p.clamp(0.0, 1.0),
        }
    }

    /// Count a request for `key` against `config`.
    pub fn check(&self, key: &str, config: RateLimitConfig) -> RateLimitDecision {
        self.check_at(key, config, Instant::now())
    }

    /// [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, key: &str, config: RateLimitConfig, now: Instant) -> RateLimitDecision {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if self.cleanup_probability > 0.0 && rand::rng().random_bool(self.cleanup_probability) {
            entries.retain(|_, entry| entry.reset_at > now);
        }

        if let Some(entry) = entries.get_mut(key).filter(|entry| now < entry.reset_at) {
            if entry.count < config.max {
                entry.count += 1;
                return RateLimitDecision {
                    allowed: true,
                    remaining: config.max - entry.count,
                    reset_at: entry.reset_at,
                };
            }
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: entry.reset_at,
            };
        }

        // New key or expired window.
        let reset_at = now + config.window;
        entries.insert(key.to_string(), Entry { count: 1, reset_at });
        RateLimitDecision {
            allowed: true,
            remaining: config.max.saturating_sub(1),
            reset_at,
        }
    }

    /// Check `client` against `category`, turning a rejection into a 429.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::RateLimited`] when the budget is spent.
    pub fn enforce(
        &self,
        category: RateLimitCategory,
        client: &ClientIp,
    ) -> Result<RateLimitDecision, AppError> {
        let key = format!("{}:{client}", category.prefix());
        let now = Instant::now();
        let decision = self.check_at(&key, category.config(), now);

        if decision.allowed {
            Ok(decision)
        } else {
            tracing::warn!(
                category = category.prefix(),
                client = %client,
                "Rate limit exceeded"
            );
            Err(AppError::RateLimited {
                retry_after_secs: decision.retry_after_secs(now),
            })
        }
    }

    /// Number of tracked keys, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Client address extraction (Cloudflare + Fly.io)
// =============================================================================

/// Best-effort client address used as the rate-limit key.
///
/// Checks Cloudflare's `CF-Connecting-IP` first, then the standard proxy
/// headers, then the TCP peer. Falls back to `unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    /// Resolve the client address from proxy headers and the peer address.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let header_ip = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        };

        ["cf-connecting-ip", "x-forwarded-for", "x-real-ip", "fly-client-ip"]
            .into_iter()
            .find_map(header_ip)
            .or_else(|| peer.map(|addr| addr.ip()))
            .map_or_else(|| Self("unknown".to_string()), |ip| Self(ip.to_string()))
    }
}

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_headers(&parts.headers, peer))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const CONFIG: RateLimitConfig = RateLimitConfig {
        window: Duration::from_secs(60),
        max: 3,
    };

    fn limiter() -> RateLimiter {
        RateLimiter::with_cleanup_probability(0.0)
    }

    #[test]
    fn test_allows_max_then_rejects() {
        let limiter = limiter();
        let now = Instant::now();

        let remaining: Vec<u32> = (0..3)
            .map(|_| {
                let decision = limiter.check_at("k", CONFIG, now);
                assert!(decision.allowed);
                decision.remaining
            })
            .collect();
        assert_eq!(remaining, [2, 1, 0]);

        let rejected = limiter.check_at("k", CONFIG, now + Duration::from_secs(30));
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.reset_at, now + CONFIG.window);
    }

    #[test]
    fn test_window_resets_at_reset_time() {
        let limiter = limiter();
        let now = Instant::now();
        for _ in 0..4 {
            limiter.check_at("k", CONFIG, now);
        }

        let fresh = limiter.check_at("k", CONFIG, now + CONFIG.window);
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 2);
        assert_eq!(fresh.reset_at, now + CONFIG.window * 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter();
        let now = Instant::now();
        for _ in 0..3 {
            limiter.check_at("a", CONFIG, now);
        }
        assert!(!limiter.check_at("a", CONFIG, now).allowed);
        assert!(limiter.check_at("b", CONFIG, now).allowed);
    }

    #[test]
    fn test_cleanup_evicts_expired_entries() {
        let limiter = RateLimiter::with_cleanup_probability(1.0);
        let now = Instant::now();
        limiter.check_at("old", CONFIG, now);
        limiter.check_at("other", RateLimitConfig::CONTACT, now);
        assert_eq!(limiter.len(), 2);

        limiter.check_at("new", CONFIG, now + Duration::from_secs(61));
        // "old" expired and was swept; "other" has a 15 minute window.
        assert_eq!(limiter.len(), 2);
        assert_eq!(
            limiter
                .check_at("old", CONFIG, now + Duration::from_secs(62))
                .remaining,
            2
        );
    }

    #[test]
    fn test_parallel_checks_never_lose_updates() {
        let limiter = limiter();
        let config = RateLimitConfig {
            window: Duration::from_secs(60),
            max: 1000,
        };
        let now = Instant::now();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        limiter.check_at("shared", config, now);
                    }
                });
            }
        });

        assert_eq!(limiter.check_at("shared", config, now).remaining, 1000 - 401);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let now = Instant::now();
        let decision = RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_at: now + Duration::from_millis(1500),
        };
        assert_eq!(decision.retry_after_secs(now), 2);
        assert_eq!(decision.retry_after_secs(now + Duration::from_secs(5)), 1);
    }

    #[test]
    fn test_enforce_returns_rate_limited() {
        let limiter = limiter();
        let client = ClientIp("203.0.113.7".to_string());
        for _ in 0..5 {
            limiter.enforce(RateLimitCategory::Contact, &client).unwrap();
        }
        let err = limiter
            .enforce(RateLimitCategory::Contact, &client)
            .unwrap_err();
        assert!(matches!(err, AppError::RateLimited { retry_after_secs } if retry_after_secs > 0));

        // Other categories keep their own budget.
        assert!(limiter.enforce(RateLimitCategory::Admin, &client).is_ok());
    }

    #[test]
    fn test_client_ip_prefers_cloudflare() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1, 10.0.0.1"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(ClientIp::from_headers(&headers, None).0, "203.0.113.9");
    }

    #[test]
    fn test_client_ip_uses_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1, 10.0.0.1"));
        assert_eq!(ClientIp::from_headers(&headers, None).0, "198.51.100.1");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "192.0.2.4:5555".parse().unwrap();
        assert_eq!(ClientIp::from_headers(&headers, Some(peer)).0, "192.0.2.4");
        assert_eq!(ClientIp::from_headers(&headers, None).0, "unknown");
    }
}
