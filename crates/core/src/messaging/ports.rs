//! Port interfaces for the notification channel

use std::sync::Arc;

use async_trait::async_trait;
use darceo_domain::{Notification, Result};
use tokio_util::sync::CancellationToken;

/// Receiver of notifications published on a subscribed topic.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Handle one notification. Errors are logged by the channel.
    async fn handle(&self, notification: &Notification) -> Result<()>;
}

/// Topic-based publish/subscribe transport.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Publish `notification` on `topic`. Publishing to a topic without
    /// subscribers succeeds.
    async fn publish(&self, topic: &str, notification: Notification) -> Result<()>;

    /// Deliver every later notification on `topic` to `handler` until the
    /// returned subscription is dropped.
    fn subscribe(&self, topic: &str, handler: Arc<dyn NotificationHandler>)
        -> Result<Subscription>;
}

/// Live registration of a handler on a topic.
///
/// Dropping the subscription cancels delivery.
#[must_use = "dropping a Subscription unsubscribes its handler"]
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    cancel: CancellationToken,
}

impl Subscription {
    /// Wrap the token that stops the adapter's delivery task.
    pub fn new(topic: impl Into<String>, cancel: CancellationToken) -> Self {
        Self { topic: topic.into(), cancel }
    }

    /// Subscribed topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether delivery is still running.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop delivery.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
