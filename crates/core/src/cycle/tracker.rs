//! Checkpoint and queue bookkeeping for one cycle at a time

use std::sync::Arc;

use chrono::{DateTime, Utc};
use darceo_domain::{
    CycleStats, ItemId, PendingWorkItem, Result, WorkCycleCheckpoint, WorkerName,
};
use tracing::debug;

use super::ports::{CheckpointStore, WorkQueueStore};

/// Persistence-agnostic facade over the work queue and checkpoint stores.
///
/// The tracker adds no locking of its own: each worker has a single writer,
/// its `Scheduler` loop, and the stores provide transactional consistency.
#[derive(Clone)]
pub struct CycleTracker {
    queue: Arc<dyn WorkQueueStore>,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl CycleTracker {
    /// Create a tracker over the given stores.
    pub fn new(queue: Arc<dyn WorkQueueStore>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self { queue, checkpoints }
    }

    /// Checkpoint store backing this tracker.
    pub fn checkpoints(&self) -> &Arc<dyn CheckpointStore> {
        &self.checkpoints
    }

    /// Current checkpoint of `worker`.
    pub async fn get_checkpoint(&self, worker: &WorkerName) -> Result<Option<WorkCycleCheckpoint>> {
        self.checkpoints.load(worker).await
    }

    /// Next queued item after `cursor`.
    pub async fn next_item(
        &self,
        worker: &WorkerName,
        cursor: Option<&ItemId>,
    ) -> Result<Option<PendingWorkItem>> {
        self.queue.find_next(worker, cursor).await
    }

    /// Create the checkpoint for a new cycle.
    pub async fn begin(
        &self,
        worker: &WorkerName,
        started_on: DateTime<Utc>,
    ) -> Result<WorkCycleCheckpoint> {
        let checkpoint = WorkCycleCheckpoint::begin(worker.clone(), started_on);
        self.checkpoints.save(&checkpoint).await?;
        debug!(worker = %worker, started_on = %started_on, "work cycle begun");
        Ok(checkpoint)
    }

    /// Advance the cursor to `item` and record the item's processing window.
    pub async fn save_progress(
        &self,
        worker: &WorkerName,
        item: &ItemId,
        started_on: DateTime<Utc>,
    ) -> Result<()> {
        let finished_on = Utc::now();
        self.queue.mark_processed(worker, item, started_on, finished_on).await?;

        let mut checkpoint = match self.checkpoints.load(worker).await? {
            Some(checkpoint) => checkpoint,
            None => WorkCycleCheckpoint::begin(worker.clone(), started_on),
        };
        checkpoint.advance(item.clone(), finished_on);
        self.checkpoints.save(&checkpoint).await
    }

    /// Mark the cycle finished and gather its statistics.
    ///
    /// Returns `None` when the worker has no checkpoint.
    pub async fn finish(&self, worker: &WorkerName) -> Result<Option<CycleStats>> {
        let Some(mut checkpoint) = self.checkpoints.load(worker).await? else {
            return Ok(None);
        };

        checkpoint.finished_on = Some(Utc::now());
        self.checkpoints.save(&checkpoint).await?;

        let first_started =
            self.queue.first_started(worker).await?.or(Some(checkpoint.started_on));
        let last_finished = self.queue.last_finished(worker).await?.or(checkpoint.updated_on);
        let total = self.queue.count_all(worker).await?;

        Ok(Some(CycleStats { worker_name: worker.clone(), first_started, last_finished, total }))
    }

    /// Remove the worker's checkpoint, then its pending items.
    ///
    /// An interrupted clear leaves items without a checkpoint; that cycle
    /// restarts from its first item.
    pub async fn clear(&self, worker: &WorkerName) -> Result<()> {
        self.checkpoints.delete(worker).await?;
        let removed = self.queue.delete_all(worker).await?;
        debug!(worker = %worker, removed, "work cycle cleared");
        Ok(())
    }

    /// Number of items still queued for `worker`.
    pub async fn pending_count(&self, worker: &WorkerName) -> Result<u64> {
        self.queue.count_all(worker).await
    }

    /// Queue freshly discovered items.
    pub async fn enqueue(&self, worker: &WorkerName, items: &[PendingWorkItem]) -> Result<usize> {
        self.queue.enqueue(worker, items).await
    }
}
