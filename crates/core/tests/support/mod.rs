//! Shared test helpers for `darceo-core` integration tests.
//!
//! In-memory implementations of every core port, plus a harness that wires
//! them into a `Scheduler`, so the scheduling tests can focus on behaviour
//! instead of storage.

pub mod channel;
pub mod processor;
pub mod stores;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use darceo_core::{CycleTracker, Scheduler, SchedulerOptions};
use darceo_domain::WorkerName;

pub use channel::RecordingChannel;
pub use processor::{ScriptedProcessor, StaticWorkSource};
pub use stores::{InMemoryCheckpointStore, InMemoryWorkQueue};

pub const WORKER: &str = "integrity";

/// Fixed timestamp `secs` seconds after the epoch.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
}

pub fn worker() -> WorkerName {
    WorkerName::from(WORKER)
}

/// Scheduler wired to in-memory collaborators.
pub struct Harness {
    pub queue: Arc<InMemoryWorkQueue>,
    pub checkpoints: Arc<InMemoryCheckpointStore>,
    pub processor: Arc<ScriptedProcessor>,
    pub channel: Arc<RecordingChannel>,
    pub scheduler: Scheduler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(InMemoryWorkQueue::new(), ScriptedProcessor::new(), SchedulerOptions::default())
    }

    pub fn with(
        queue: InMemoryWorkQueue,
        processor: ScriptedProcessor,
        options: SchedulerOptions,
    ) -> Self {
        let queue = Arc::new(queue);
        let checkpoints = Arc::new(InMemoryCheckpointStore::default());
        let processor = Arc::new(processor);
        let channel = Arc::new(RecordingChannel::default());
        let scheduler = Self::scheduler_over(&queue, &checkpoints, &processor, &channel, options);
        Self { queue, checkpoints, processor, channel, scheduler }
    }

    /// Fresh scheduler sharing this harness's stores, as after a restart.
    pub fn restarted(&self) -> Scheduler {
        Self::scheduler_over(
            &self.queue,
            &self.checkpoints,
            &self.processor,
            &self.channel,
            SchedulerOptions::default(),
        )
    }

    fn scheduler_over(
        queue: &Arc<InMemoryWorkQueue>,
        checkpoints: &Arc<InMemoryCheckpointStore>,
        processor: &Arc<ScriptedProcessor>,
        channel: &Arc<RecordingChannel>,
        options: SchedulerOptions,
    ) -> Scheduler {
        let tracker = CycleTracker::new(queue.clone(), checkpoints.clone());
        Scheduler::builder(WORKER, tracker, processor.clone(), channel.clone())
            .options(options)
            .build()
    }

    pub fn seed(&self, items: &[(&str, i64)]) {
        self.queue.seed(&worker(), items);
    }

    pub fn cursor(&self) -> Option<String> {
        self.checkpoints
            .get(&worker())
            .and_then(|checkpoint| checkpoint.cursor)
            .map(|cursor| cursor.as_str().to_owned())
    }
}

/// Poll `condition` every 10ms until it holds; panics after two seconds.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let polled = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), polled)
        .await
        .expect("condition not reached within two seconds");
}

/// Await `future`, failing the test after two seconds.
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), future).await.expect("timed out")
}
