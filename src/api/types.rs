//! Shared types for the API layer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::indicators::{
    DEFAULT_TREND_WEEKS, DEFAULT_WINDOW_DAYS, MAX_TREND_WEEKS, MAX_WINDOW_DAYS,
};

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus API-specific state.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub trust_forwarded_for: bool,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        let server = &core.settings().server;
        let limiter = RateLimiter::new(server.rate_per_minute, server.rate_per_hour);
        let trust_forwarded_for = server.trust_forwarded_for;
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(limiter)),
            trust_forwarded_for,
        }
    }
}

/// `Authorization: Bearer <token>`, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Client address of a request, resolved once by the rate limiter and
/// stored in request extensions for audit records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSource(pub String);

/// Source used when neither a trusted header nor a peer address is known.
pub const UNKNOWN_SOURCE: &str = "api";

/// Client address for rate limiting and audit.
///
/// `X-Forwarded-For` is client-controlled, so its first entry is used only
/// when `trust_forwarded_for` is set. Otherwise the TCP peer address from
/// `ConnectInfo` is used, and requests without one share a single source.
pub fn client_source<B>(req: &Request<B>, trust_forwarded_for: bool) -> ClientSource {
    let forwarded = trust_forwarded_for
        .then(|| forwarded_for(req.headers()))
        .flatten();
    let source = forwarded
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
    ClientSource(source)
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ═══════════════════════════════════════════════════════════
// Query parameters
// ═══════════════════════════════════════════════════════════

/// `?days=` for trailing-window indicators (1..=3650, default 30).
#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

impl DaysQuery {
    pub fn resolve(&self) -> Result<u32, ApiError> {
        bounded(self.days, "days", DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS)
    }
}

/// `?weeks=` for the weekly trend (1..=52, default 4).
#[derive(Debug, Default, Deserialize)]
pub struct WeeksQuery {
    pub weeks: Option<i64>,
}

impl WeeksQuery {
    pub fn resolve(&self) -> Result<u32, ApiError> {
        bounded(self.weeks, "weeks", DEFAULT_TREND_WEEKS, MAX_TREND_WEEKS)
    }
}

fn bounded(value: Option<i64>, name: &str, default: u32, max: u32) -> Result<u32, ApiError> {
    match value {
        None => Ok(default),
        Some(v) if (1..=i64::from(max)).contains(&v) => Ok(v as u32),
        Some(v) => Err(ApiError::BadRequest(format!(
            "{name} must be between 1 and {max}, got {v}"
        ))),
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-key sliding window
// ═══════════════════════════════════════════════════════════

const HOUR: Duration = Duration::from_secs(3600);

/// Idle keys are dropped at most this often.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-key rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
            last_sweep: Instant::now(),
        }
    }

    /// Check if a key is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    fn check_at(&mut self, key: &str, now: Instant) -> Result<(), u64> {
        if now.saturating_duration_since(self.last_sweep) >= SWEEP_INTERVAL {
            self.sweep(now);
        }

        let entries = self.windows.entry(key.to_string()).or_default();

        // Clean entries older than 1 hour
        entries.retain(|ts| now.saturating_duration_since(*ts) < HOUR);

        let last_minute = entries
            .iter()
            .filter(|ts| now.saturating_duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }

    /// Drop keys with no request in the last hour.
    fn sweep(&mut self, now: Instant) {
        self.windows.retain(|_, entries| {
            entries
                .last()
                .is_some_and(|ts| now.saturating_duration_since(*ts) < HOUR)
        });
        self.last_sweep = now;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(100, 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn rate_limiter_allows_under_limit() {
        let mut limiter = RateLimiter::default();
        for _ in 0..50 {
            assert!(limiter.check("key-1").is_ok());
        }
    }

    #[test]
    fn rate_limiter_rejects_over_per_minute() {
        let mut limiter = RateLimiter::new(3, 1000);
        for _ in 0..3 {
            limiter.check("key-1").unwrap();
        }
        assert_eq!(limiter.check("key-1"), Err(60));
    }

    #[test]
    fn rate_limiter_rejects_over_per_hour() {
        let mut limiter = RateLimiter::new(100, 5);
        for _ in 0..5 {
            limiter.check("key-1").unwrap();
        }
        assert_eq!(limiter.check("key-1"), Err(3600));
    }

    #[test]
    fn rate_limiter_isolates_keys() {
        let mut limiter = RateLimiter::new(1, 1000);
        limiter.check("key-1").unwrap();
        assert!(limiter.check("key-1").is_err());
        assert!(limiter.check("key-2").is_ok());
    }

    #[test]
    fn rate_limiter_sweeps_idle_keys() {
        let mut limiter = RateLimiter::new(10, 1000);
        let start = Instant::now();
        for i in 0..50 {
            limiter.check_at(&format!("anon:10.0.0.{i}"), start).unwrap();
        }
        assert_eq!(limiter.tracked_keys(), 50);

        limiter
            .check_at("anon:10.0.0.99", start + HOUR + SWEEP_INTERVAL)
            .unwrap();
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn rate_limiter_keeps_recent_keys_on_sweep() {
        let mut limiter = RateLimiter::new(10, 1000);
        let start = Instant::now();
        limiter.check_at("old", start).unwrap();
        limiter.check_at("recent", start + HOUR).unwrap();
        limiter.check_at("new", start + HOUR + SWEEP_INTERVAL).unwrap();
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn forwarded_for_ignored_unless_trusted() {
        let req = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_source(&req, false), ClientSource(UNKNOWN_SOURCE.into()));
        assert_eq!(client_source(&req, true), ClientSource("203.0.113.7".into()));
    }

    #[test]
    fn peer_address_used_when_header_untrusted() {
        let mut req = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7")
            .body(())
            .unwrap();
        let peer: SocketAddr = "192.0.2.10:51000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_source(&req, false), ClientSource("192.0.2.10".into()));
    }

    #[test]
    fn days_query_bounds() {
        assert_eq!(DaysQuery { days: None }.resolve().unwrap(), 30);
        assert_eq!(DaysQuery { days: Some(1) }.resolve().unwrap(), 1);
        assert_eq!(DaysQuery { days: Some(3650) }.resolve().unwrap(), 3650);
        assert!(DaysQuery { days: Some(0) }.resolve().is_err());
        assert!(DaysQuery { days: Some(3651) }.resolve().is_err());
        assert!(DaysQuery { days: Some(-5) }.resolve().is_err());
    }

    #[test]
    fn weeks_query_bounds() {
        assert_eq!(WeeksQuery { weeks: None }.resolve().unwrap(), 4);
        assert_eq!(WeeksQuery { weeks: Some(52) }.resolve().unwrap(), 52);
        assert!(WeeksQuery { weeks: Some(53) }.resolve().is_err());
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());
        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());
        headers.insert("Authorization", HeaderValue::from_static("Bearer tok-123"));
        assert_eq!(bearer_token(&headers), Some("tok-123"));
    }
}
