//! Service configuration.

use std::str::FromStr;
use std::time::Duration;

use greenlight_store::StoreConfig;

/// Per-client rate limiting settings.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether requests are rate limited at all.
    pub enabled: bool,
    /// Steady refill rate per client.
    pub requests_per_second: u32,
    /// Bucket capacity per client.
    pub burst: u32,
    /// Clients not seen for this long are forgotten by the sweeper.
    pub idle_timeout: Duration,
    /// Key clients on `X-Forwarded-For` / `X-Real-IP` instead of the socket
    /// peer. Only safe behind a proxy that sets those headers.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2,
            burst: 4,
            idle_timeout: Duration::from_secs(180),
            trust_proxy_headers: false,
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:4000").
    pub listen_addr: String,

    /// Deployment environment reported by the healthcheck (default: "development").
    pub environment: String,

    /// PostgreSQL URL. The in-memory store is used when absent.
    pub database_url: Option<String>,

    /// Maximum pooled database connections.
    pub db_max_connections: u32,

    /// Upper bound on a single store call in seconds.
    pub db_query_timeout_seconds: u64,

    /// Insert translatable parents and their first translation atomically.
    pub db_atomic_insert: bool,

    /// Rate limiter settings.
    pub rate_limit: RateLimitConfig,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Lifetime of activation tokens in hours.
    pub activation_token_ttl_hours: i64,

    /// Lifetime of authentication tokens in hours.
    pub auth_token_ttl_hours: i64,
}

impl ServiceConfig {
    /// Load configuration from environment variables. Unset or unparsable
    /// values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let rate_defaults = defaults.rate_limit.clone();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            environment: std::env::var("GREENLIGHT_ENV").unwrap_or(defaults.environment),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            db_query_timeout_seconds: env_or(
                "DB_QUERY_TIMEOUT_SECONDS",
                defaults.db_query_timeout_seconds,
            ),
            db_atomic_insert: env_or("DB_ATOMIC_INSERT", defaults.db_atomic_insert),
            rate_limit: RateLimitConfig {
                enabled: env_or("LIMITER_ENABLED", rate_defaults.enabled),
                requests_per_second: env_or("LIMITER_RPS", rate_defaults.requests_per_second),
                burst: env_or("LIMITER_BURST", rate_defaults.burst),
                idle_timeout: Duration::from_secs(env_or(
                    "LIMITER_IDLE_SECONDS",
                    rate_defaults.idle_timeout.as_secs(),
                )),
                trust_proxy_headers: env_or(
                    "LIMITER_TRUST_PROXY",
                    rate_defaults.trust_proxy_headers,
                ),
            },
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_or("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: env_or(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
            activation_token_ttl_hours: env_or(
                "ACTIVATION_TOKEN_TTL_HOURS",
                defaults.activation_token_ttl_hours,
            ),
            auth_token_ttl_hours: env_or("AUTH_TOKEN_TTL_HOURS", defaults.auth_token_ttl_hours),
        }
    }

    /// Settings handed to the store backend.
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            query_timeout: Duration::from_secs(self.db_query_timeout_seconds),
            max_connections: self.db_max_connections,
            atomic_translatable_insert: self.db_atomic_insert,
        }
    }
}

/// Parse `key` from the environment, or return `default`.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:4000".into(),
            environment: "development".into(),
            database_url: None,
            db_max_connections: 25,
            db_query_timeout_seconds: 3,
            db_atomic_insert: true,
            rate_limit: RateLimitConfig::default(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            activation_token_ttl_hours: 72,
            auth_token_ttl_hours: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_config_follows_service_config() {
        let config = ServiceConfig {
            db_query_timeout_seconds: 7,
            db_atomic_insert: false,
            ..ServiceConfig::default()
        };
        let store = config.store_config();
        assert_eq!(store.query_timeout, Duration::from_secs(7));
        assert!(!store.atomic_translatable_insert);
        assert_eq!(store.max_connections, 25);
    }

    #[test]
    fn unparsable_values_fall_back() {
        assert_eq!(env_or("GREENLIGHT_TEST_UNSET_VARIABLE", 42_u32), 42);
    }
}
