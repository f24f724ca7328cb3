//! Per-client rate limiting.
//!
//! Every client gets its own token bucket (a `governor` GCRA limiter),
//! created on first sight and forgotten once idle. Clients are identified by
//! the socket peer. Behind a trusted proxy (`trust_proxy_headers`) the first
//! `X-Forwarded-For` hop, then `X-Real-IP`, take precedence.
//!
//! Rejected requests get `429 Too Many Requests` and never reach a handler.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::state::AppState;

type ClientLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

struct Client {
    limiter: ClientLimiter,
    last_seen: Instant,
}

/// Token buckets keyed by client identity.
pub struct RateLimiter {
    config: RateLimitConfig,
    quota: Quota,
    clients: Mutex<HashMap<String, Client>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("clients", &self.len())
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter with no known clients.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let rate = NonZeroU32::new(config.requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst.max(1)).unwrap_or(NonZeroU32::MIN);

        Self {
            quota: Quota::per_second(rate).allow_burst(burst),
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Client>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take one token from `client`'s bucket, creating the bucket if needed.
    /// Returns `false` when the bucket is empty.
    pub fn allow(&self, client: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut clients = self.lock();
        let now = Instant::now();
        let entry = clients.entry(client.to_string()).or_insert_with(|| Client {
            limiter: governor::RateLimiter::direct(self.quota),
            last_seen: now,
        });
        entry.last_seen = now;
        entry.limiter.check().is_ok()
    }

    /// Forget clients not seen for longer than `idle`. Returns how many were
    /// removed.
    pub fn sweep(&self, idle: Duration) -> usize {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, c| c.last_seen.elapsed() <= idle);
        before - clients.len()
    }

    /// Number of tracked clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no clients are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep idle clients every `interval` until the runtime shuts down.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        let idle = limiter.config.idle_timeout;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = limiter.sweep(idle);
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.len(), "Swept idle rate limit clients");
                }
            }
        })
    }
}

/// Identify the client behind a request. Forwarding headers are only
/// consulted when `trust_proxy_headers` is set, since clients control them.
#[must_use]
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    if !trust_proxy_headers {
        return peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string());
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }
    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

/// Rate limiting middleware for Axum.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_identity(
        req.headers(),
        peer,
        state.config.rate_limit.trust_proxy_headers,
    );

    if !state.limiter.allow(&client) {
        tracing::warn!(client = %client, path = %req.uri().path(), "Rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig::default())
    }

    #[test]
    fn burst_then_refill() {
        let limiter = limiter();
        for _ in 0..4 {
            assert!(limiter.allow("10.0.0.1"));
        }
        assert!(!limiter.allow("10.0.0.1"));

        // Two tokens per second: one token back after 500ms.
        std::thread::sleep(Duration::from_millis(550));
        assert!(limiter.allow("10.0.0.1"));
    }

    #[test]
    fn clients_have_separate_buckets() {
        let limiter = limiter();
        for _ in 0..4 {
            assert!(limiter.allow("a"));
        }
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn disabled_admits_everything() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });
        for _ in 0..100 {
            assert!(limiter.allow("a"));
        }
        assert!(limiter.is_empty());
    }

    #[test]
    fn sweep_removes_idle_clients() {
        let limiter = limiter();
        limiter.allow("old");
        std::thread::sleep(Duration::from_millis(30));
        limiter.allow("new");

        assert_eq!(limiter.sweep(Duration::from_millis(20)), 1);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.sweep(Duration::from_secs(60)), 0);
    }

    #[test]
    fn trusted_identity_prefers_forwarded_headers() {
        let peer: SocketAddr = "192.0.2.7:5000".parse().unwrap();

        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers, Some(peer), true), "192.0.2.7");
        assert_eq!(client_identity(&headers, None, true), "unknown");

        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_identity(&headers, Some(peer), true), "198.51.100.2");

        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_identity(&headers, Some(peer), true), "203.0.113.9");
    }

    #[test]
    fn untrusted_identity_ignores_forwarded_headers() {
        let peer: SocketAddr = "192.0.2.7:5000".parse().unwrap();
        let limiter = limiter();

        for i in 0..50 {
            let mut headers = HeaderMap::new();
            headers.insert(
                "x-forwarded-for",
                format!("198.51.100.{i}").parse().unwrap(),
            );
            headers.insert("x-real-ip", format!("203.0.113.{i}").parse().unwrap());
            let client = client_identity(&headers, Some(peer), false);
            assert_eq!(client, "192.0.2.7");

            // Only the first burst of four gets through.
            assert_eq!(limiter.allow(&client), i < 4);
        }
        assert_eq!(limiter.len(), 1);
    }
}
