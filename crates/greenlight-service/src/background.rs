//! Fire-and-forget background tasks.
//!
//! Handlers use [`BackgroundRunner::run`] for side effects that must not
//! delay or fail the response, such as sending the activation notice. Errors
//! and panics are logged and go no further.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

/// Error type returned by background tasks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Spawns tracked tasks and waits for them on shutdown.
#[derive(Debug, Clone, Default)]
pub struct BackgroundRunner {
    tracker: TaskTracker,
}

impl BackgroundRunner {
    /// Create a runner with no tasks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` inside the caller's span. The caller does not wait for it.
    pub fn run<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.tracker.spawn(async move {
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => tracing::debug!(task = name, "Background task finished"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "Background task failed"),
                Err(panic) => tracing::error!(
                    task = name,
                    panic = %panic_message(panic.as_ref()),
                    "Background task panicked"
                ),
            }
        }
        .in_current_span());
    }

    /// Number of tasks still running.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    /// Whether no tasks are running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Close the runner and wait up to `timeout` for running
    /// tasks. Returns `false` if some were still running when time ran out.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::info!(pending, "Waiting for background tasks");
        }
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(remaining = self.tracker.len(), "Background tasks still running at shutdown");
        }
        drained
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
