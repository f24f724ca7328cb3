//! User notifications.

use async_trait::async_trait;

use crate::background::BoxError;

/// Everything needed to tell a new user how to activate their account.
/// Owned, so it can move into a background task.
#[derive(Debug, Clone)]
pub struct ActivationNotice {
    /// Recipient id.
    pub user_id: i64,
    /// Recipient name.
    pub name: String,
    /// Recipient address.
    pub email: String,
    /// Activation token plaintext.
    pub token: String,
}

/// Delivers notices to users.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the activation notice.
    async fn send_activation(&self, notice: ActivationNotice) -> Result<(), BoxError>;
}

/// Writes notices to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_activation(&self, notice: ActivationNotice) -> Result<(), BoxError> {
        // The token is a credential and stays out of the log.
        tracing::info!(
            user_id = notice.user_id,
            email = %notice.email,
            name = %notice.name,
            "Activation notice"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn log_notifier_keeps_token_out_of_logs() {
        let notice = ActivationNotice {
            user_id: 42,
            name: "Alice".into(),
            email: "alice@example.com".into(),
            token: "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU".into(),
        };

        LogNotifier.send_activation(notice).await.unwrap();

        assert!(logs_contain("Activation notice"));
        assert!(logs_contain("alice@example.com"));
        assert!(!logs_contain("Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"));
    }
}
