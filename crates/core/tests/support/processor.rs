//! Scripted item processor and static work source

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use darceo_core::{ItemProcessor, ProcessError, WorkSource};
use darceo_domain::{ItemId, ProcessOutcome, Result};
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

type Scripted = std::result::Result<ProcessOutcome, ProcessError>;

/// Processor returning queued outcomes per item, `NoFinding` once a script
/// runs dry.
#[derive(Default)]
pub struct ScriptedProcessor {
    scripts: Mutex<HashMap<ItemId, VecDeque<Scripted>>>,
    calls: Mutex<Vec<ItemId>>,
    gate: Option<Arc<Semaphore>>,
    entered: Arc<Notify>,
}

impl ScriptedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call blocks until a permit is released with [`Self::release`].
    pub fn gated() -> Self {
        Self { gate: Some(Arc::new(Semaphore::new(0))), ..Self::default() }
    }

    pub fn script(&self, item: &str, outcomes: Vec<Scripted>) {
        self.scripts.lock().entry(ItemId::from(item)).or_default().extend(outcomes);
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    /// Resolves once a `process` call has begun.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|id| id.as_str().to_owned()).collect()
    }
}

#[async_trait]
impl ItemProcessor for ScriptedProcessor {
    async fn process(&self, item: &ItemId) -> std::result::Result<ProcessOutcome, ProcessError> {
        self.calls.lock().push(item.clone());
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let scripted = self.scripts.lock().get_mut(item).and_then(VecDeque::pop_front);
        scripted.unwrap_or(Ok(ProcessOutcome::NoFinding))
    }
}

pub struct StaticWorkSource {
    ids: Vec<ItemId>,
}

impl StaticWorkSource {
    pub fn new(ids: &[&str]) -> Self {
        Self { ids: ids.iter().map(|id| ItemId::from(*id)).collect() }
    }
}

#[async_trait]
impl WorkSource for StaticWorkSource {
    async fn discover(&self) -> Result<Vec<ItemId>> {
        Ok(self.ids.clone())
    }
}
