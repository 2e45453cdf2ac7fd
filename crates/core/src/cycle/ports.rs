//! Port interfaces for work-cycle storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use darceo_domain::{ItemId, PendingWorkItem, Result, WorkCycleCheckpoint, WorkerName};

/// Persistent queue of pending work items, one slice per worker.
///
/// Items are ordered by `(discovered_on, item_id)` ascending. Nothing is
/// removed while a cycle runs; consumed items stay until `delete_all`.
#[async_trait]
pub trait WorkQueueStore: Send + Sync {
    /// Add items to the worker's queue, ignoring ids that are already queued.
    ///
    /// Returns the number of newly inserted items.
    async fn enqueue(&self, worker: &WorkerName, items: &[PendingWorkItem]) -> Result<usize>;

    /// First item strictly after `after` in queue order, or the first item
    /// overall when `after` is `None`.
    ///
    /// A cursor that is no longer queued yields `None`.
    async fn find_next(
        &self,
        worker: &WorkerName,
        after: Option<&ItemId>,
    ) -> Result<Option<PendingWorkItem>>;

    /// Record when processing of `item` started and finished.
    async fn mark_processed(
        &self,
        worker: &WorkerName,
        item: &ItemId,
        started_on: DateTime<Utc>,
        finished_on: DateTime<Utc>,
    ) -> Result<()>;

    /// Number of queued items, processed or not.
    async fn count_all(&self, worker: &WorkerName) -> Result<u64>;

    /// Remove every queued item of the worker. Returns how many were removed.
    async fn delete_all(&self, worker: &WorkerName) -> Result<u64>;

    /// Earliest `started_on` among the worker's processed items.
    async fn first_started(&self, worker: &WorkerName) -> Result<Option<DateTime<Utc>>>;

    /// Latest `finished_on` among the worker's processed items.
    async fn last_finished(&self, worker: &WorkerName) -> Result<Option<DateTime<Utc>>>;
}

/// Persistent per-worker checkpoint records.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint of `worker`, if one exists.
    async fn load(&self, worker: &WorkerName) -> Result<Option<WorkCycleCheckpoint>>;

    /// Insert or replace the checkpoint keyed by its worker name.
    async fn save(&self, checkpoint: &WorkCycleCheckpoint) -> Result<()>;

    /// Delete the checkpoint of `worker`. Returns whether a row existed.
    async fn delete(&self, worker: &WorkerName) -> Result<bool>;

    /// Every checkpoint without `finished_on`.
    async fn list_unfinished(&self) -> Result<Vec<WorkCycleCheckpoint>>;
}
