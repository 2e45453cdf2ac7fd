//! Per-worker work-cycle scheduler
//!
//! A `Scheduler` drives one worker through its queue: it resumes from the
//! checkpoint cursor, hands each item to the worker's `ItemProcessor`,
//! publishes findings, and finishes the cycle once the queue is exhausted.
//!
//! Run state (`active`, `running`, the availability wait) lives behind one
//! mutex per scheduler. The loop runs as a Tokio task and is cancelled
//! cooperatively between items, never while an item is being processed.
//!
//! Every method that may launch the loop (`activate`, `start`,
//! `notify_available`) must be called from within a Tokio runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use darceo_domain::constants::REPORTS_TOPIC;
use darceo_domain::{
    CycleStats, CycleStep, DarceoError, InitializeOutcome, ItemId, ItemReport, Notification,
    PendingWorkItem, ProcessOutcome, Result, WorkerName,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cycle::CycleTracker;
use crate::messaging::ports::NotificationChannel;
use crate::processing::ports::{ItemProcessor, ProcessError, WorkSource};

/// Tunables of a scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Retry an unavailable item after this long even without an
    /// availability notification. `None` waits indefinitely.
    pub availability_timeout: Option<Duration>,
}

#[derive(Default)]
struct RunState {
    active: bool,
    running: bool,
    /// Launch again once the current loop has exited.
    relaunch: bool,
    waiting_for: Option<ItemId>,
    wait_timer: Option<CancellationToken>,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl RunState {
    fn take_wait(&mut self) -> Option<ItemId> {
        if let Some(timer) = self.wait_timer.take() {
            timer.cancel();
        }
        self.waiting_for.take()
    }
}

struct Inner {
    name: WorkerName,
    tracker: CycleTracker,
    processor: Arc<dyn ItemProcessor>,
    channel: Arc<dyn NotificationChannel>,
    source: Option<Arc<dyn WorkSource>>,
    options: SchedulerOptions,
    state: Mutex<RunState>,
}

/// Resumable work-cycle scheduler for one worker.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

/// Builder for [`Scheduler`].
pub struct SchedulerBuilder {
    name: WorkerName,
    tracker: CycleTracker,
    processor: Arc<dyn ItemProcessor>,
    channel: Arc<dyn NotificationChannel>,
    source: Option<Arc<dyn WorkSource>>,
    options: SchedulerOptions,
}

impl SchedulerBuilder {
    /// Producer used by [`Scheduler::initialize_work`].
    pub fn work_source(mut self, source: Arc<dyn WorkSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Override the default options.
    pub fn options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    /// Build an inactive, idle scheduler.
    pub fn build(self) -> Scheduler {
        Scheduler {
            inner: Arc::new(Inner {
                name: self.name,
                tracker: self.tracker,
                processor: self.processor,
                channel: self.channel,
                source: self.source,
                options: self.options,
                state: Mutex::new(RunState::default()),
            }),
        }
    }
}

impl Scheduler {
    /// Start building a scheduler for `name`.
    pub fn builder(
        name: impl Into<WorkerName>,
        tracker: CycleTracker,
        processor: Arc<dyn ItemProcessor>,
        channel: Arc<dyn NotificationChannel>,
    ) -> SchedulerBuilder {
        SchedulerBuilder {
            name: name.into(),
            tracker,
            processor,
            channel,
            source: None,
            options: SchedulerOptions::default(),
        }
    }

    /// Worker name.
    pub fn name(&self) -> &WorkerName {
        &self.inner.name
    }

    /// Whether the worker is switched on.
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    /// Whether a loop task is executing.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Item whose availability the scheduler is waiting for.
    pub fn waiting_for(&self) -> Option<ItemId> {
        self.inner.state.lock().waiting_for.clone()
    }

    /// Switch the worker on and start the loop unless it is running.
    pub fn activate(&self) {
        let mut state = self.inner.state.lock();
        state.active = true;
        if state.running {
            // A cancelled loop may still be finishing its last item.
            if state.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                state.relaunch = true;
            }
            return;
        }
        info!(worker = %self.inner.name, "worker activated");
        self.launch(&mut state);
    }

    /// Switch the worker off and ask the loop to stop after its current item.
    pub fn deactivate(&self) {
        let mut state = self.inner.state.lock();
        state.active = false;
        state.relaunch = false;
        if let Some(cancel) = &state.cancel {
            cancel.cancel();
        }
        info!(worker = %self.inner.name, running = state.running, "worker deactivated");
    }

    /// Launch the loop if the worker is active and not already running.
    ///
    /// Returns whether a loop was launched.
    pub fn start(&self) -> bool {
        let mut state = self.inner.state.lock();
        if !state.active {
            debug!(worker = %self.inner.name, "start ignored: worker inactive");
            return false;
        }
        if state.running {
            debug!(worker = %self.inner.name, "start ignored: loop already running");
            return false;
        }
        self.launch(&mut state);
        true
    }

    /// Ask the running loop, if any, to stop after its current item.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        state.relaunch = false;
        if let Some(cancel) = &state.cancel {
            if !cancel.is_cancelled() {
                debug!(worker = %self.inner.name, "stop requested");
            }
            cancel.cancel();
        }
    }

    /// Resume the worker if it is waiting for exactly `item`.
    ///
    /// Returns whether the wait matched. A loop that is still winding down is
    /// told to run again, so the wake-up is never lost.
    pub fn notify_available(&self, item: &ItemId) -> bool {
        self.release_wait(item, "item available")
    }

    /// Forget the availability wait without restarting.
    pub fn clear_wait(&self) {
        let cleared = self.inner.state.lock().take_wait();
        if let Some(item) = cleared {
            debug!(worker = %self.inner.name, item_id = %item, "availability wait cleared");
        }
    }

    /// Wait for the current loop task, and any relaunch of it, to end.
    pub async fn join(&self) {
        loop {
            let handle = self.inner.state.lock().handle.take();
            let Some(handle) = handle else { break };
            if let Err(err) = handle.await {
                error!(worker = %self.inner.name, error = %err, "scheduler task failed");
            }
        }
    }

    /// Process exactly one item.
    ///
    /// # Errors
    /// Propagates store failures and `ProcessError`s; the cursor is left
    /// untouched in both cases.
    #[instrument(skip(self), fields(worker = %self.inner.name))]
    pub async fn process_one(&self) -> Result<CycleStep> {
        let name = &self.inner.name;
        let tracker = &self.inner.tracker;

        let checkpoint = tracker.get_checkpoint(name).await?;
        let cursor = checkpoint.as_ref().and_then(|c| c.cursor.clone());

        let Some(next) = tracker.next_item(name, cursor.as_ref()).await? else {
            debug!("no item after cursor");
            return Ok(CycleStep::Empty);
        };

        let started_on = Utc::now();
        if checkpoint.is_none() {
            tracker.begin(name, started_on).await?;
        }

        let item_id = next.item_id;
        let outcome = match self.inner.processor.process(&item_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    ProcessError::Retryable(_) => {
                        warn!(item_id = %item_id, error = %err, "item processing failed, will retry");
                    }
                    ProcessError::Fatal(_) => {
                        error!(item_id = %item_id, error = %err, "item processing failed");
                    }
                }
                return Err(err.into());
            }
        };

        if !matches!(outcome, ProcessOutcome::Unavailable) {
            self.settle_wait(&item_id);
        }

        match outcome {
            ProcessOutcome::Unavailable => {
                self.enter_wait(item_id);
                Ok(CycleStep::WaitingForDependency)
            }
            ProcessOutcome::Finding(finding) => {
                let report = ItemReport {
                    worker_name: name.clone(),
                    item_id: item_id.clone(),
                    finding,
                    reported_on: Utc::now(),
                };
                self.inner.channel.publish(REPORTS_TOPIC, Notification::ItemReport(report)).await?;
                tracker.save_progress(name, &item_id, started_on).await?;
                debug!(item_id = %item_id, "item processed with finding");
                Ok(CycleStep::Processed)
            }
            ProcessOutcome::NoFinding => {
                tracker.save_progress(name, &item_id, started_on).await?;
                debug!(item_id = %item_id, "item processed");
                Ok(CycleStep::Processed)
            }
        }
    }

    /// Log cycle statistics, then drop the checkpoint and the queued items.
    ///
    /// Returns `None` when there was no cycle to finish.
    #[instrument(skip(self), fields(worker = %self.inner.name))]
    pub async fn finish_cycle(&self) -> Result<Option<CycleStats>> {
        let name = &self.inner.name;
        let Some(stats) = self.inner.tracker.finish(name).await? else {
            debug!("no checkpoint, nothing to finish");
            return Ok(None);
        };

        let elapsed_ms = stats.elapsed().map(|elapsed| elapsed.num_milliseconds());
        info!(
            total = stats.total,
            elapsed_ms,
            first_started = ?stats.first_started,
            last_finished = ?stats.last_finished,
            "work cycle finished"
        );

        self.inner.tracker.clear(name).await?;
        Ok(Some(stats))
    }

    /// Process items until the queue is exhausted, the next item is
    /// unavailable, or `cancel` fires.
    ///
    /// # Errors
    /// Returns the first processing or store failure.
    pub async fn process_all(&self, cancel: &CancellationToken) -> Result<()> {
        let started = Instant::now();
        let mut processed = 0_u64;

        loop {
            if cancel.is_cancelled() {
                info!(worker = %self.inner.name, processed, "work loop cancelled");
                return Ok(());
            }

            match self.process_one().await? {
                CycleStep::Processed => processed += 1,
                CycleStep::Empty => {
                    self.finish_cycle().await?;
                    debug!(
                        worker = %self.inner.name,
                        processed,
                        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "work loop exhausted queue"
                    );
                    return Ok(());
                }
                CycleStep::WaitingForDependency => {
                    info!(
                        worker = %self.inner.name,
                        processed,
                        waiting_for = ?self.waiting_for(),
                        "work loop paused for unavailable item"
                    );
                    return Ok(());
                }
            }
        }
    }

    /// Seed the worker's queue for a new cycle from its work source.
    ///
    /// Skipped while the previous cycle still has queued items.
    ///
    /// # Errors
    /// `DarceoError::Config` when the scheduler has no work source, or any
    /// store or source failure.
    #[instrument(skip(self), fields(worker = %self.inner.name))]
    pub async fn initialize_work(&self) -> Result<InitializeOutcome> {
        let name = &self.inner.name;
        let source = self.inner.source.as_ref().ok_or_else(|| {
            DarceoError::Config(format!("worker '{name}' has no work source configured"))
        })?;

        let pending = self.inner.tracker.pending_count(name).await?;
        if pending > 0 {
            info!(pending, "previous cycle unfinished, initialization skipped");
            return Ok(InitializeOutcome::Skipped { pending });
        }

        // A checkpoint next to an empty queue points at nothing.
        if let Some(stale) = self.inner.tracker.get_checkpoint(name).await? {
            warn!(
                cursor = ?stale.cursor,
                finished_on = ?stale.finished_on,
                "dropping leftover checkpoint before seeding"
            );
            self.inner.tracker.clear(name).await?;
        }

        let mut ids = source.discover().await?;
        ids.sort();
        ids.dedup();

        let discovered_on = Utc::now();
        let items: Vec<PendingWorkItem> =
            ids.into_iter().map(|id| PendingWorkItem::new(id, discovered_on)).collect();
        let count = self.inner.tracker.enqueue(name, &items).await?;

        info!(count, "work queue initialized");
        Ok(InitializeOutcome::Seeded { count })
    }

    fn launch(&self, state: &mut RunState) {
        let cancel = CancellationToken::new();
        state.running = true;
        state.relaunch = false;
        state.cancel = Some(cancel.clone());

        let this = self.clone();
        state.handle = Some(tokio::spawn(async move { this.run(cancel).await }));
        debug!(worker = %self.inner.name, "work loop launched");
    }

    async fn run(self, cancel: CancellationToken) {
        if let Err(err) = self.process_all(&cancel).await {
            error!(
                worker = %self.inner.name,
                error = %err,
                kind = err.label(),
                "work loop aborted; next start retries the same item"
            );
        }

        let mut state = self.inner.state.lock();
        state.running = false;
        state.cancel = None;
        if state.relaunch && state.active {
            debug!(worker = %self.inner.name, "relaunching work loop");
            self.launch(&mut state);
        } else {
            state.relaunch = false;
        }
    }

    fn enter_wait(&self, item: ItemId) {
        let mut state = self.inner.state.lock();
        if let Some(timer) = state.wait_timer.take() {
            timer.cancel();
        }

        if let Some(timeout) = self.inner.options.availability_timeout {
            let timer = CancellationToken::new();
            state.wait_timer = Some(timer.clone());

            let this = self.clone();
            let waited = item.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = timer.cancelled() => {}
                    () = tokio::time::sleep(timeout) => {
                        this.release_wait(&waited, "availability timeout elapsed");
                    }
                }
            });
        }

        info!(worker = %self.inner.name, item_id = %item, "waiting for item availability");
        state.waiting_for = Some(item);
    }

    /// Drop the wait on `item` once it was processed by a plain restart.
    fn settle_wait(&self, item: &ItemId) {
        let mut state = self.inner.state.lock();
        if state.waiting_for.as_ref() == Some(item) {
            state.take_wait();
            debug!(worker = %self.inner.name, item_id = %item, "availability wait settled");
        }
    }

    fn release_wait(&self, item: &ItemId, reason: &'static str) -> bool {
        let mut state = self.inner.state.lock();
        if state.waiting_for.as_ref() != Some(item) {
            return false;
        }
        state.take_wait();

        info!(worker = %self.inner.name, item_id = %item, reason, "availability wait released");
        if state.running {
            state.relaunch = true;
        } else if state.active {
            self.launch(&mut state);
        }
        true
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Scheduler")
            .field("name", &self.inner.name)
            .field("active", &state.active)
            .field("running", &state.running)
            .field("waiting_for", &state.waiting_for)
            .finish_non_exhaustive()
    }
}
