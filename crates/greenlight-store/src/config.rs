//! Store configuration.

use std::time::Duration;

/// Default per-query timeout.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Settings shared by every backend.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Upper bound on a single store call, including connection acquisition.
    pub query_timeout: Duration,
    /// Maximum pooled connections (PostgreSQL only).
    pub max_connections: u32,
    /// Write a translatable parent and its first translation in one
    /// transaction. When `false` the two inserts are separate statements and
    /// a failure between them leaves a parent without translations.
    pub atomic_translatable_insert: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_connections: 25,
            atomic_translatable_insert: true,
        }
    }
}
