//! Application state.

use std::sync::Arc;

use greenlight_store::Store;

use crate::background::BackgroundRunner;
use crate::config::ServiceConfig;
use crate::notify::{LogNotifier, Notifier};
use crate::rate_limit::RateLimiter;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Per-client request budgets.
    pub limiter: Arc<RateLimiter>,

    /// Runner for work that outlives the request.
    pub background: BackgroundRunner,

    /// Delivers activation notices.
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Create a new application state that logs notices instead of sending them.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        if !config.rate_limit.enabled {
            tracing::warn!("Rate limiting disabled");
        }

        Self {
            store,
            config,
            limiter,
            background: BackgroundRunner::new(),
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Replace the notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}
