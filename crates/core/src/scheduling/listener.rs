//! Bridges availability notifications to the registry

use std::sync::Arc;

use async_trait::async_trait;
use darceo_domain::constants::ITEM_AVAILABLE_TOPIC;
use darceo_domain::{Notification, Result};
use tracing::trace;

use super::registry::WorkerRegistry;
use crate::messaging::ports::{NotificationChannel, NotificationHandler, Subscription};

/// Resumes waiting schedulers when an item becomes available.
pub struct AvailabilityListener {
    registry: Arc<WorkerRegistry>,
}

impl AvailabilityListener {
    /// Create a listener over `registry`.
    pub fn new(registry: Arc<WorkerRegistry>) -> Self {
        Self { registry }
    }

    /// Subscribe a new listener to the availability topic of `channel`.
    ///
    /// # Errors
    /// Propagates subscription failures of the channel.
    pub fn attach(
        registry: Arc<WorkerRegistry>,
        channel: &dyn NotificationChannel,
    ) -> Result<Subscription> {
        channel.subscribe(ITEM_AVAILABLE_TOPIC, Arc::new(Self::new(registry)))
    }
}

#[async_trait]
impl NotificationHandler for AvailabilityListener {
    async fn handle(&self, notification: &Notification) -> Result<()> {
        match notification {
            Notification::ItemAvailable { item_id } => {
                self.registry.notify_available(item_id);
            }
            Notification::ItemReport(report) => {
                trace!(item_id = %report.item_id, "ignoring report on availability topic");
            }
        }
        Ok(())
    }
}
