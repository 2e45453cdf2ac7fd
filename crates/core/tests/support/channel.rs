//! Channel that records publications and delivers them inline

use std::sync::Arc;

use async_trait::async_trait;
use darceo_core::{NotificationChannel, NotificationHandler, Subscription};
use darceo_domain::{ItemReport, Notification, Result};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

type Registration = (String, Arc<dyn NotificationHandler>, CancellationToken);

#[derive(Default)]
pub struct RecordingChannel {
    published: Mutex<Vec<(String, Notification)>>,
    handlers: Mutex<Vec<Registration>>,
}

impl RecordingChannel {
    pub fn published(&self) -> Vec<(String, Notification)> {
        self.published.lock().clone()
    }

    /// Reports published on any topic, in order.
    pub fn reports(&self) -> Vec<ItemReport> {
        self.published
            .lock()
            .iter()
            .filter_map(|(_, notification)| match notification {
                Notification::ItemReport(report) => Some(report.clone()),
                Notification::ItemAvailable { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn publish(&self, topic: &str, notification: Notification) -> Result<()> {
        self.published.lock().push((topic.to_owned(), notification.clone()));

        let targets: Vec<Arc<dyn NotificationHandler>> = self
            .handlers
            .lock()
            .iter()
            .filter(|(subscribed, _, token)| subscribed == topic && !token.is_cancelled())
            .map(|(_, handler, _)| handler.clone())
            .collect();
        for handler in targets {
            handler.handle(&notification).await?;
        }
        Ok(())
    }

    fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<Subscription> {
        let token = CancellationToken::new();
        self.handlers.lock().push((topic.to_owned(), handler, token.clone()));
        Ok(Subscription::new(topic, token))
    }
}
