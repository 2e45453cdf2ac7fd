//! Work-cycle records: checkpoints, pending items and cycle statistics.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{ItemId, WorkerName};
use crate::impl_domain_enum_conversions;

/// Per-worker progress record for the current cycle.
///
/// A checkpoint exists from the moment the first item of a cycle starts until
/// the cycle is finished and cleared. `cursor` always names an item that is
/// (or was) in the worker's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCycleCheckpoint {
    pub worker_name: WorkerName,
    /// Last successfully processed item; `None` until the first one finishes.
    pub cursor: Option<ItemId>,
    pub started_on: DateTime<Utc>,
    /// When the cursor last advanced.
    pub updated_on: Option<DateTime<Utc>>,
    pub finished_on: Option<DateTime<Utc>>,
}

impl WorkCycleCheckpoint {
    /// Fresh checkpoint for a cycle whose first item starts at `started_on`.
    pub fn begin(worker_name: WorkerName, started_on: DateTime<Utc>) -> Self {
        Self { worker_name, cursor: None, started_on, updated_on: None, finished_on: None }
    }

    /// Move the cursor to `item`.
    pub fn advance(&mut self, item: ItemId, at: DateTime<Utc>) {
        self.cursor = Some(item);
        self.updated_on = Some(at);
    }

    /// A checkpoint without `finished_on` belongs to a cycle that must be
    /// resumed after a restart.
    pub const fn is_in_progress(&self) -> bool {
        self.finished_on.is_none()
    }
}

/// One entry of a worker's work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWorkItem {
    pub item_id: ItemId,
    pub discovered_on: DateTime<Utc>,
    pub started_on: Option<DateTime<Utc>>,
    pub finished_on: Option<DateTime<Utc>>,
}

impl PendingWorkItem {
    /// Newly discovered, not yet processed item.
    pub const fn new(item_id: ItemId, discovered_on: DateTime<Utc>) -> Self {
        Self { item_id, discovered_on, started_on: None, finished_on: None }
    }

    /// Queue order: discovery time first, identifier as tie-break.
    pub const fn order_key(&self) -> (DateTime<Utc>, &ItemId) {
        (self.discovered_on, &self.item_id)
    }

    /// Whether the item has been consumed in the current cycle.
    pub const fn is_processed(&self) -> bool {
        self.finished_on.is_some()
    }
}

/// Result of a single `process_one` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStep {
    /// One item was handled and the cursor advanced.
    Processed,
    /// No item left after the cursor; the cycle is over.
    Empty,
    /// The next item's data is not available yet.
    WaitingForDependency,
}

impl_domain_enum_conversions!(CycleStep {
    Processed => "processed",
    Empty => "empty",
    WaitingForDependency => "waiting_for_dependency",
});

/// Statistics reported when a cycle finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    pub worker_name: WorkerName,
    pub first_started: Option<DateTime<Utc>>,
    pub last_finished: Option<DateTime<Utc>>,
    pub total: u64,
}

impl CycleStats {
    /// Wall-clock span of the cycle, when both ends are known.
    pub fn elapsed(&self) -> Option<Duration> {
        match (self.first_started, self.last_finished) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }
}

/// Outcome of populating a worker's queue for a new cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InitializeOutcome {
    /// The queue was empty and `count` new items were enqueued.
    Seeded { count: usize },
    /// The previous cycle still has `pending` items; nothing was enqueued.
    Skipped { pending: u64 },
}
