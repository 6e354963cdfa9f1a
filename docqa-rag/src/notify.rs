//! Notification sinks for delivering answers.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

/// A destination for per-query answer messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message.
    async fn notify(&self, text: &str) -> Result<()>;

    /// A short name used in logs and errors.
    fn name(&self) -> &str;
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        debug!(text_len = text.len(), "discarding notification");
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Format the message sent for one answered query.
pub fn format_notification(query: &str, answer: &str) -> String {
    format!("*User Query:* {query}\n*AI Response:* {answer}")
}
