//! In-process notification channel built on `tokio::sync::broadcast`
//!
//! One broadcast sender exists per topic. Every subscription owns a receiver
//! and a forwarding task that hands notifications to its handler in order.
//! Lagging subscribers lose the overwritten notifications and keep going.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use darceo_core::{NotificationChannel, NotificationHandler, Subscription};
use darceo_domain::constants::DEFAULT_CHANNEL_CAPACITY;
use darceo_domain::{DarceoError, Notification, Result};
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Topic-keyed broadcast channel for a single process.
pub struct InProcessChannel {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<Notification>>>,
    shutdown: CancellationToken,
}

impl InProcessChannel {
    /// Channel whose topics buffer up to `capacity` notifications per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop every forwarding task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Number of live receivers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, broadcast::Sender::receiver_count)
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Notification> {
        self.topics
            .lock()
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for InProcessChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl NotificationChannel for InProcessChannel {
    async fn publish(&self, topic: &str, notification: Notification) -> Result<()> {
        let sender = self.topics.lock().get(topic).cloned();
        match sender.map(|sender| sender.send(notification)) {
            Some(Ok(receivers)) => trace!(topic, receivers, "notification published"),
            Some(Err(_)) | None => debug!(topic, "notification published without subscribers"),
        }
        Ok(())
    }

    fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<Subscription> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
            DarceoError::Internal(format!("subscribing to '{topic}' outside a runtime: {err}"))
        })?;

        let mut receiver = self.sender(topic).subscribe();
        let cancel = self.shutdown.child_token();
        let task_cancel = cancel.clone();
        let task_topic = topic.to_owned();

        runtime.spawn(async move {
            loop {
                tokio::select! {
                    () = task_cancel.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(notification) => {
                            if let Err(err) = handler.handle(&notification).await {
                                warn!(topic = %task_topic, error = %err, "notification handler failed");
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(topic = %task_topic, skipped, "subscriber lagged; notifications dropped");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            debug!(topic = %task_topic, "subscription ended");
        });

        debug!(topic, "subscribed");
        Ok(Subscription::new(topic, cancel))
    }
}
