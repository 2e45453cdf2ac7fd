//! Cron activation clock for worker schedulers.
//!
//! Registers one cron job per timer of every worker: activation and
//! deactivation for scheduled workers, and periodic initialisation of the
//! work queue. Always-active workers are switched on once when the clock
//! starts. The lifecycle is explicit: join handles are tracked,
//! cancellation goes through a token, and every asynchronous call into the
//! job scheduler is wrapped in a timeout.

use std::sync::Arc;
use std::time::Duration;

use darceo_core::Scheduler;
use darceo_domain::{ActivationPolicy, InitializeOutcome};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Check that `expression` parses as a six-field cron schedule.
///
/// # Errors
/// `SchedulerError::InvalidSchedule` with the parser's reason.
pub fn validate_cron(expression: &str) -> SchedulerResult<()> {
    Job::new_async(expression, |_id, _lock| Box::pin(async {}))
        .map(|_| ())
        .map_err(|source| SchedulerError::InvalidSchedule { expression: expression.to_owned(), source })
}

/// Timeouts of the activation clock.
#[derive(Debug, Clone)]
pub struct ActivationClockConfig {
    /// Timeout applied to one run of a work initializer.
    pub initialize_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for ActivationClockConfig {
    fn default() -> Self {
        Self {
            initialize_timeout: Duration::from_secs(600),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// When a worker is switched on and when its queue is refilled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerTimetable {
    /// Activation behaviour derived from the worker's schedules.
    pub policy: ActivationPolicy,
    /// Cron expression of the work initializer, if any.
    pub initializer: Option<String>,
}

struct ClockEntry {
    scheduler: Scheduler,
    timetable: WorkerTimetable,
}

/// Cron-driven activation of worker schedulers.
pub struct CronActivationClock {
    config: ActivationClockConfig,
    entries: Vec<ClockEntry>,
    scheduler: Option<Arc<RwLock<JobScheduler>>>,
    job_ids: Vec<Uuid>,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl CronActivationClock {
    /// Create an empty clock.
    pub fn new(config: ActivationClockConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            scheduler: None,
            job_ids: Vec::new(),
            monitor_handle: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Drive `scheduler` according to `timetable` once the clock starts.
    ///
    /// # Errors
    /// `SchedulerError::InvalidSchedule` for unparsable cron expressions,
    /// `SchedulerError::AlreadyRunning` once the clock is started.
    pub fn register(
        &mut self,
        scheduler: Scheduler,
        timetable: WorkerTimetable,
    ) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        if let ActivationPolicy::Scheduled { activate, deactivate } = &timetable.policy {
            validate_cron(activate)?;
            validate_cron(deactivate)?;
        }
        if let Some(initializer) = &timetable.initializer {
            validate_cron(initializer)?;
        }

        debug!(worker = %scheduler.name(), policy = ?timetable.policy, "worker timetable registered");
        self.entries.push(ClockEntry { scheduler, timetable });
        Ok(())
    }

    /// Number of cron jobs registered by the last start.
    pub fn job_count(&self) -> usize {
        self.job_ids.len()
    }

    /// Register every cron job, start ticking and switch on always-active
    /// workers.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let raw_scheduler =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;
        let scheduler = Arc::new(RwLock::new(raw_scheduler));
        self.job_ids = self.register_jobs(&scheduler).await?;

        let start_timeout = self.config.start_timeout;
        let starting = scheduler.clone();
        let start_result = tokio::time::timeout(start_timeout, async move {
            let guard = starting.write().await;
            guard.start().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?;

        start_result.map_err(|source| SchedulerError::StartFailed { source })?;
        self.scheduler = Some(scheduler);

        for entry in &self.entries {
            if entry.timetable.policy == ActivationPolicy::AlwaysActive {
                entry.scheduler.activate();
            }
        }

        let cancel = self.cancellation.clone();
        self.monitor_handle = Some(tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("activation clock monitor cancelled");
        }));

        info!(workers = self.entries.len(), jobs = self.job_ids.len(), "activation clock started");
        Ok(())
    }

    /// Stop firing timers. Worker loops keep their state; callers stop them
    /// separately.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        if let Some(scheduler) = self.scheduler.take() {
            let stop_timeout = self.config.stop_timeout;
            let stop_result = tokio::time::timeout(stop_timeout, async move {
                let mut guard = scheduler.write().await;
                guard.shutdown().await
            })
            .await
            .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?;

            stop_result.map_err(|source| SchedulerError::StopFailed { source })?;
        }

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        self.job_ids.clear();
        info!("activation clock stopped");
        Ok(())
    }

    /// Returns true while the monitor task is active.
    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn register_jobs(
        &self,
        scheduler: &Arc<RwLock<JobScheduler>>,
    ) -> SchedulerResult<Vec<Uuid>> {
        let mut jobs = Vec::new();
        for entry in &self.entries {
            if let ActivationPolicy::Scheduled { activate, deactivate } = &entry.timetable.policy {
                jobs.push(activation_job(activate, entry.scheduler.clone(), true)?);
                jobs.push(activation_job(deactivate, entry.scheduler.clone(), false)?);
            }
            if let Some(initializer) = &entry.timetable.initializer {
                jobs.push(initializer_job(
                    initializer,
                    entry.scheduler.clone(),
                    self.config.initialize_timeout,
                )?);
            }
        }

        let guard = scheduler.write().await;
        let mut ids = Vec::with_capacity(jobs.len());
        for job in jobs {
            let id = guard
                .add(job)
                .await
                .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;
            ids.push(id);
        }
        Ok(ids)
    }
}

fn activation_job(expression: &str, scheduler: Scheduler, activate: bool) -> SchedulerResult<Job> {
    let job = Job::new_async(expression, move |_id, _lock| {
        let scheduler = scheduler.clone();
        Box::pin(async move {
            if activate {
                scheduler.activate();
            } else {
                scheduler.deactivate();
            }
        })
    })
    .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

    debug!(cron = expression, activate, job_id = %job.guid(), "registered activation job");
    Ok(job)
}

fn initializer_job(
    expression: &str,
    scheduler: Scheduler,
    timeout: Duration,
) -> SchedulerResult<Job> {
    let job = Job::new_async(expression, move |_id, _lock| {
        let scheduler = scheduler.clone();
        Box::pin(async move {
            match tokio::time::timeout(timeout, scheduler.initialize_work()).await {
                Ok(Ok(outcome)) => {
                    if let InitializeOutcome::Seeded { count } = outcome {
                        debug!(worker = %scheduler.name(), count, "initializer seeded queue");
                    }
                    scheduler.start();
                }
                Ok(Err(err)) => {
                    error!(worker = %scheduler.name(), error = %err, "work initialization failed");
                }
                Err(_) => {
                    warn!(
                        worker = %scheduler.name(),
                        timeout_secs = timeout.as_secs(),
                        "work initialization timed out"
                    );
                }
            }
        })
    })
    .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

    debug!(cron = expression, job_id = %job.guid(), "registered initializer job");
    Ok(job)
}

impl Drop for CronActivationClock {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("CronActivationClock dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use async_trait::async_trait;
    use darceo_core::{CycleTracker, ItemProcessor, ProcessError, WorkSource};
    use darceo_domain::{ItemId, ProcessOutcome, Result};
    use parking_lot::Mutex;
    use tempfile::TempDir;

    use super::*;
    use crate::database::{DbManager, SqliteCheckpointRepository, SqliteWorkQueueRepository};
    use crate::messaging::InProcessChannel;

    const EVERY_SECOND: &str = "*/1 * * * * *";
    const NEW_YEAR: &str = "0 0 0 1 1 *";

    #[derive(Default)]
    struct RecordingProcessor {
        seen: Mutex<Vec<ItemId>>,
    }

    #[async_trait]
    impl ItemProcessor for RecordingProcessor {
        async fn process(&self, item: &ItemId) -> std::result::Result<ProcessOutcome, ProcessError> {
            self.seen.lock().push(item.clone());
            Ok(ProcessOutcome::NoFinding)
        }
    }

    struct FixedSource(Vec<ItemId>);

    #[async_trait]
    impl WorkSource for FixedSource {
        async fn discover(&self) -> Result<Vec<ItemId>> {
            Ok(self.0.clone())
        }
    }

    fn fast_config() -> ActivationClockConfig {
        ActivationClockConfig {
            initialize_timeout: Duration::from_secs(2),
            start_timeout: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(2),
            join_timeout: Duration::from_secs(2),
        }
    }

    fn scheduler(dir: &TempDir, processor: Arc<RecordingProcessor>) -> Scheduler {
        let db = DbManager::new(dir.path().join("clock.db"), 2).expect("manager created");
        db.run_migrations().expect("migrations applied");
        let db = Arc::new(db);
        let tracker = CycleTracker::new(
            Arc::new(SqliteWorkQueueRepository::new(db.clone())),
            Arc::new(SqliteCheckpointRepository::new(db)),
        );
        Scheduler::builder("integrity", tracker, processor, Arc::new(InProcessChannel::default()))
            .work_source(Arc::new(FixedSource(vec!["b".into(), "a".into()])))
            .build()
    }

    async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(4);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        condition()
    }

    #[test]
    fn cron_validation_reports_the_expression() {
        validate_cron("0 0 2 * * *").expect("valid expression");

        let err = validate_cron("every night").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));
        assert!(err.to_string().contains("every night"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn always_active_workers_are_switched_on_at_start() {
        let dir = TempDir::new().unwrap();
        let worker = scheduler(&dir, Arc::new(RecordingProcessor::default()));
        let mut clock = CronActivationClock::new(fast_config());
        clock
            .register(
                worker.clone(),
                WorkerTimetable { policy: ActivationPolicy::AlwaysActive, initializer: None },
            )
            .unwrap();

        clock.start().await.expect("start succeeds");
        assert!(worker.is_active());
        assert_eq!(clock.job_count(), 0);

        clock.stop().await.expect("stop succeeds");
        worker.deactivate();
        worker.join().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn activation_window_fires() {
        let dir = TempDir::new().unwrap();
        let worker = scheduler(&dir, Arc::new(RecordingProcessor::default()));
        let mut clock = CronActivationClock::new(fast_config());
        clock
            .register(
                worker.clone(),
                WorkerTimetable {
                    policy: ActivationPolicy::Scheduled {
                        activate: EVERY_SECOND.into(),
                        deactivate: NEW_YEAR.into(),
                    },
                    initializer: None,
                },
            )
            .unwrap();

        clock.start().await.expect("start succeeds");
        assert_eq!(clock.job_count(), 2);
        assert!(eventually(|| worker.is_active()).await);

        clock.stop().await.expect("stop succeeds");
        assert!(!clock.is_running());
        worker.deactivate();
        worker.join().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn initializer_seeds_and_starts_the_worker() {
        let dir = TempDir::new().unwrap();
        let processor = Arc::new(RecordingProcessor::default());
        let worker = scheduler(&dir, processor.clone());
        let mut clock = CronActivationClock::new(fast_config());
        clock
            .register(
                worker.clone(),
                WorkerTimetable {
                    policy: ActivationPolicy::AlwaysActive,
                    initializer: Some(EVERY_SECOND.into()),
                },
            )
            .unwrap();

        clock.start().await.expect("start succeeds");
        assert!(eventually(|| processor.seen.lock().len() >= 2).await);
        clock.stop().await.expect("stop succeeds");
        worker.deactivate();
        worker.join().await;

        let seen = processor.seen.lock().clone();
        assert_eq!(&seen[..2], &[ItemId::from("a"), ItemId::from("b")]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_timetable_is_rejected() {
        let dir = TempDir::new().unwrap();
        let worker = scheduler(&dir, Arc::new(RecordingProcessor::default()));
        let mut clock = CronActivationClock::new(fast_config());

        let err = clock
            .register(
                worker,
                WorkerTimetable { policy: ActivationPolicy::Manual, initializer: Some("nope".into()) },
            )
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_start_is_rejected_and_restart_works() {
        let mut clock = CronActivationClock::new(fast_config());

        clock.start().await.expect("first start");
        let err = clock.start().await.expect_err("second start fails");
        assert!(matches!(err, SchedulerError::AlreadyRunning));
        clock.stop().await.expect("stop succeeds");

        let err = clock.stop().await.expect_err("stop while stopped fails");
        assert!(matches!(err, SchedulerError::NotRunning));

        clock.start().await.expect("start again");
        clock.stop().await.expect("stop again");
    }
}
