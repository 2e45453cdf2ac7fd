//! In-memory work queue and checkpoint store

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use darceo_core::{CheckpointStore, WorkQueueStore};
use darceo_domain::{
    DarceoError, ItemId, PendingWorkItem, Result, WorkCycleCheckpoint, WorkerName,
};
use parking_lot::Mutex;

use super::ts;

/// Work queue that also records how many `find_next` calls overlap.
#[derive(Default)]
pub struct InMemoryWorkQueue {
    items: Mutex<BTreeMap<WorkerName, Vec<PendingWorkItem>>>,
    find_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    find_calls: AtomicUsize,
    fail_delete: AtomicBool,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every `find_next` call open for `delay` to widen race windows.
    pub fn with_find_delay(delay: Duration) -> Self {
        Self { find_delay: Some(delay), ..Self::default() }
    }

    /// Queue `(id, discovered_on secs)` pairs for `worker`.
    pub fn seed(&self, worker: &WorkerName, items: &[(&str, i64)]) {
        let mut map = self.items.lock();
        let queue = map.entry(worker.clone()).or_default();
        for (id, secs) in items {
            queue.push(PendingWorkItem::new(ItemId::from(*id), ts(*secs)));
        }
    }

    /// Make the next `delete_all` fail, as if the process died mid-clear.
    pub fn fail_next_delete(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self, worker: &WorkerName) -> Vec<PendingWorkItem> {
        self.items.lock().get(worker).cloned().unwrap_or_default()
    }

    pub fn len(&self, worker: &WorkerName) -> usize {
        self.items.lock().get(worker).map_or(0, Vec::len)
    }

    pub fn max_concurrent_find_next(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn find_next_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    fn next_after(&self, worker: &WorkerName, after: Option<&ItemId>) -> Option<PendingWorkItem> {
        let map = self.items.lock();
        let mut items = map.get(worker).cloned().unwrap_or_default();
        items.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

        match after {
            None => items.into_iter().next(),
            Some(cursor) => {
                let position = items.iter().position(|item| &item.item_id == cursor)?;
                items.into_iter().nth(position + 1)
            }
        }
    }
}

#[async_trait]
impl WorkQueueStore for InMemoryWorkQueue {
    async fn enqueue(&self, worker: &WorkerName, items: &[PendingWorkItem]) -> Result<usize> {
        let mut map = self.items.lock();
        let queue = map.entry(worker.clone()).or_default();
        let mut inserted = 0;
        for item in items {
            if queue.iter().all(|queued| queued.item_id != item.item_id) {
                queue.push(item.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn find_next(
        &self,
        worker: &WorkerName,
        after: Option<&ItemId>,
    ) -> Result<Option<PendingWorkItem>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.find_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.next_after(worker, after);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(next)
    }

    async fn mark_processed(
        &self,
        worker: &WorkerName,
        item: &ItemId,
        started_on: DateTime<Utc>,
        finished_on: DateTime<Utc>,
    ) -> Result<()> {
        let mut map = self.items.lock();
        if let Some(entry) = map
            .get_mut(worker)
            .and_then(|queue| queue.iter_mut().find(|queued| &queued.item_id == item))
        {
            entry.started_on = Some(started_on);
            entry.finished_on = Some(finished_on);
        }
        Ok(())
    }

    async fn count_all(&self, worker: &WorkerName) -> Result<u64> {
        Ok(self.len(worker) as u64)
    }

    async fn delete_all(&self, worker: &WorkerName) -> Result<u64> {
        if self.fail_delete.swap(false, Ordering::SeqCst) {
            return Err(DarceoError::Database("disk I/O error".into()));
        }
        Ok(self.items.lock().remove(worker).map_or(0, |queue| queue.len() as u64))
    }

    async fn first_started(&self, worker: &WorkerName) -> Result<Option<DateTime<Utc>>> {
        Ok(self.snapshot(worker).iter().filter_map(|item| item.started_on).min())
    }

    async fn last_finished(&self, worker: &WorkerName) -> Result<Option<DateTime<Utc>>> {
        Ok(self.snapshot(worker).iter().filter_map(|item| item.finished_on).max())
    }
}

#[derive(Default)]
pub struct InMemoryCheckpointStore {
    rows: Mutex<BTreeMap<WorkerName, WorkCycleCheckpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn get(&self, worker: &WorkerName) -> Option<WorkCycleCheckpoint> {
        self.rows.lock().get(worker).cloned()
    }

    pub fn insert(&self, checkpoint: WorkCycleCheckpoint) {
        self.rows.lock().insert(checkpoint.worker_name.clone(), checkpoint);
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, worker: &WorkerName) -> Result<Option<WorkCycleCheckpoint>> {
        Ok(self.get(worker))
    }

    async fn save(&self, checkpoint: &WorkCycleCheckpoint) -> Result<()> {
        self.insert(checkpoint.clone());
        Ok(())
    }

    async fn delete(&self, worker: &WorkerName) -> Result<bool> {
        Ok(self.rows.lock().remove(worker).is_some())
    }

    async fn list_unfinished(&self) -> Result<Vec<WorkCycleCheckpoint>> {
        Ok(self.rows.lock().values().filter(|c| c.is_in_progress()).cloned().collect())
    }
}
