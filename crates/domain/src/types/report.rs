//! Processing outcomes, findings and the notifications that carry them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ItemId, WorkerName};

/// Category of a reportable finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Stored content no longer matches its recorded digest.
    Corrupted,
    /// The object could not be found at its storage location.
    Missing,
    /// The object's file format carries a loss risk above threshold.
    FormatAtRisk,
    /// Plugin-specific finding.
    Custom(String),
}

/// Something an item processor wants interested parties to know about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Finding {
    /// Finding without structured data.
    pub fn new(kind: FindingKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into(), data: None }
    }

    /// Attach structured data to the finding.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// What an item processor made of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Processing finished and produced a finding to publish.
    Finding(Finding),
    /// Processing finished with nothing to report.
    NoFinding,
    /// The item's data is not available yet; retry after it arrives.
    Unavailable,
}

/// Finding of one worker about one item, as published on the reports topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub worker_name: WorkerName,
    pub item_id: ItemId,
    pub finding: Finding,
    pub reported_on: DateTime<Utc>,
}

/// Message exchanged over the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A worker produced a finding.
    ItemReport(ItemReport),
    /// A producer made an item's data available for download.
    ItemAvailable { item_id: ItemId },
}
