//! Name-keyed set of schedulers, built once at startup

use std::collections::BTreeMap;

use darceo_domain::{DarceoError, ItemId, Result, WorkerName};
use tracing::{debug, info, instrument, warn};

use super::scheduler::Scheduler;
use crate::cycle::ports::CheckpointStore;

/// Immutable registry of every configured worker's scheduler.
#[derive(Debug, Default, Clone)]
pub struct WorkerRegistry {
    schedulers: BTreeMap<WorkerName, Scheduler>,
}

/// Builder for [`WorkerRegistry`].
#[derive(Debug, Default)]
pub struct WorkerRegistryBuilder {
    schedulers: BTreeMap<WorkerName, Scheduler>,
}

impl WorkerRegistryBuilder {
    /// Add a scheduler.
    ///
    /// # Errors
    /// `DarceoError::InvalidInput` if a scheduler with the same name exists.
    pub fn register(mut self, scheduler: Scheduler) -> Result<Self> {
        let name = scheduler.name().clone();
        if self.schedulers.contains_key(&name) {
            return Err(DarceoError::InvalidInput(format!("worker '{name}' registered twice")));
        }
        self.schedulers.insert(name, scheduler);
        Ok(self)
    }

    /// Freeze the registry.
    pub fn build(self) -> WorkerRegistry {
        WorkerRegistry { schedulers: self.schedulers }
    }
}

impl WorkerRegistry {
    /// Start building a registry.
    pub fn builder() -> WorkerRegistryBuilder {
        WorkerRegistryBuilder::default()
    }

    /// Scheduler registered under `name`.
    pub fn get(&self, name: &WorkerName) -> Option<&Scheduler> {
        self.schedulers.get(name)
    }

    fn require(&self, name: &WorkerName) -> Result<&Scheduler> {
        self.get(name).ok_or_else(|| DarceoError::NotFound(format!("worker '{name}'")))
    }

    /// Registered worker names, sorted.
    pub fn names(&self) -> Vec<WorkerName> {
        self.schedulers.keys().cloned().collect()
    }

    /// Every registered scheduler, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Scheduler> {
        self.schedulers.values()
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.schedulers.len()
    }

    /// Whether no workers are registered.
    pub fn is_empty(&self) -> bool {
        self.schedulers.is_empty()
    }

    /// Activate the named worker.
    ///
    /// # Errors
    /// `DarceoError::NotFound` for unknown names.
    pub fn activate(&self, name: &WorkerName) -> Result<()> {
        self.require(name)?.activate();
        Ok(())
    }

    /// Deactivate the named worker.
    ///
    /// # Errors
    /// `DarceoError::NotFound` for unknown names.
    pub fn deactivate(&self, name: &WorkerName) -> Result<()> {
        self.require(name)?.deactivate();
        Ok(())
    }

    /// Start the named worker; returns whether a loop was launched.
    ///
    /// # Errors
    /// `DarceoError::NotFound` for unknown names.
    pub fn start(&self, name: &WorkerName) -> Result<bool> {
        Ok(self.require(name)?.start())
    }

    /// Stop the named worker's loop.
    ///
    /// # Errors
    /// `DarceoError::NotFound` for unknown names.
    pub fn stop(&self, name: &WorkerName) -> Result<()> {
        self.require(name)?.stop();
        Ok(())
    }

    /// Forward an availability notification to every scheduler.
    ///
    /// Returns how many schedulers were waiting for `item`.
    pub fn notify_available(&self, item: &ItemId) -> usize {
        let resumed =
            self.schedulers.values().filter(|scheduler| scheduler.notify_available(item)).count();
        debug!(item_id = %item, resumed, "availability notification dispatched");
        resumed
    }

    /// Restart every registered worker whose last cycle never finished.
    ///
    /// Workers that are inactive stay idle and continue from their
    /// checkpoint once activated. Returns the names whose loop was launched.
    ///
    /// # Errors
    /// Propagates checkpoint store failures.
    #[instrument(skip_all)]
    pub async fn resume_in_progress(
        &self,
        checkpoints: &dyn CheckpointStore,
    ) -> Result<Vec<WorkerName>> {
        let mut resumed = Vec::new();
        for checkpoint in checkpoints.list_unfinished().await? {
            let name = checkpoint.worker_name;
            let Some(scheduler) = self.get(&name) else {
                warn!(worker = %name, "unfinished checkpoint for unknown worker left untouched");
                continue;
            };

            if scheduler.start() {
                info!(worker = %name, cursor = ?checkpoint.cursor, "resumed unfinished work cycle");
                resumed.push(name);
            } else {
                info!(
                    worker = %name,
                    cursor = ?checkpoint.cursor,
                    "unfinished work cycle will resume on activation"
                );
            }
        }
        Ok(resumed)
    }

    /// Deactivate every scheduler; loops stop after their current item.
    pub fn stop_all(&self) {
        for scheduler in self.schedulers.values() {
            scheduler.deactivate();
        }
    }

    /// Wait for every scheduler's loop task to end.
    pub async fn join_all(&self) {
        for scheduler in self.schedulers.values() {
            scheduler.join().await;
        }
    }
}
