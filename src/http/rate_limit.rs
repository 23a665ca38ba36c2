//! Rate limiting
//!
//! Two halves: a governor token bucket that paces outgoing requests under
//! the hourly quota, and [`RateLimitInfo`], the server's view of that quota
//! as reported in response headers.

use chrono::{DateTime, TimeZone, Utc};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const HEADER_LIMIT: &str = "x-ratelimit-limit";
const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";
const HEADER_RETRY_AFTER: &str = "retry-after";

/// Padding added to every wait-until-reset so the window has really rolled over
const RESET_PADDING: Duration = Duration::from_secs(1);

// ============================================================================
// Client-side pacing
// ============================================================================

/// Configuration for request pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Server quota, requests per hour
    pub requests_per_hour: u32,
    /// Fraction of the quota left unused (0.1 keeps 10% in reserve)
    pub safety_margin: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_hour: 1000,
            safety_margin: 0.1,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(requests_per_hour: u32, safety_margin: f64) -> Self {
        Self {
            requests_per_hour,
            safety_margin,
        }
    }

    /// Requests per hour actually allowed after the safety margin
    pub fn effective_per_hour(&self) -> f64 {
        let margin = self.safety_margin.clamp(0.0, 0.99);
        (f64::from(self.requests_per_hour.max(1)) * (1.0 - margin)).max(1.0)
    }

    /// Minimum spacing between two requests
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(3600.0 / self.effective_per_hour())
    }
}

/// Token bucket rate limiter shared by every request a client makes
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
    interval: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let interval = config.interval();
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);

        Self {
            limiter: Arc::new(Governor::direct(quota)),
            interval,
        }
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Spacing enforced between requests
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Server-reported quota
// ============================================================================

/// Quota state reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitInfo {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// Window reset, epoch seconds
    pub reset: Option<i64>,
}

impl RateLimitInfo {
    /// Parse the `x-ratelimit-*` headers; `None` when none are present
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let info = Self {
            limit: header_value(headers, HEADER_LIMIT),
            remaining: header_value(headers, HEADER_REMAINING),
            reset: header_value(headers, HEADER_RESET),
        };

        if info.limit.is_none() && info.remaining.is_none() && info.reset.is_none() {
            None
        } else {
            Some(info)
        }
    }

    /// Reset instant, if reported
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        self.reset
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// Time to wait for the window to reset, padded by one second.
    /// A reset already in the past still yields the padding.
    pub fn wait_until_reset(&self, now: DateTime<Utc>) -> Option<Duration> {
        let reset_at = self.reset_at()?;
        let until = (reset_at - now).to_std().unwrap_or(Duration::ZERO);
        Some(until + RESET_PADDING)
    }

    /// Whether the remaining quota is below `threshold`
    pub fn is_low(&self, threshold: u64) -> bool {
        self.remaining.is_some_and(|r| r < threshold)
    }
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: Option<u64>| v.map_or_else(|| "?".to_string(), |v| v.to_string());
        write!(f, "{}/{} remaining", show(self.remaining), show(self.limit))?;
        if let Some(reset_at) = self.reset_at() {
            write!(f, ", resets at {}", reset_at.format("%H:%M:%S UTC"))?;
        }
        Ok(())
    }
}

/// Parse a `retry-after` header given in seconds
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_value::<u64>(headers, HEADER_RETRY_AFTER).map(Duration::from_secs)
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}
