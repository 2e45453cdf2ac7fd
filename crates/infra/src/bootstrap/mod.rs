//! Composition root
//!
//! Turns a validated [`Config`] into running workers: opens the database,
//! builds one scheduler per enabled worker, subscribes the availability
//! listener, starts the activation clock and resumes unfinished cycles.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use darceo_core::{
    AvailabilityListener, CheckpointStore, CycleTracker, NotificationChannel, Scheduler,
    SchedulerOptions, Subscription, WorkQueueStore, WorkerRegistry,
};
use darceo_domain::constants::DEFAULT_CHANNEL_CAPACITY;
use darceo_domain::{Config, DarceoError, Result, WorkerConfig, WorkerKind, WorkerName};
use tokio::task;
use tracing::{info, instrument, warn};

use crate::database::{DbManager, SqliteCheckpointRepository, SqliteWorkQueueRepository};
use crate::messaging::InProcessChannel;
use crate::processors::{HttpIdentifierSource, HttpIntegrityProcessor};
use crate::scheduling::{ActivationClockConfig, CronActivationClock, WorkerTimetable};

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for a [`Runtime`].
pub struct Bootstrap {
    config: Config,
    clock: ActivationClockConfig,
    channel_capacity: usize,
    drain_timeout: Duration,
}

impl Bootstrap {
    /// Bootstrap `config` with default clock, channel and drain settings.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: ActivationClockConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Override the activation clock timeouts.
    #[must_use]
    pub fn clock_config(mut self, clock: ActivationClockConfig) -> Self {
        self.clock = clock;
        self
    }

    /// Per-subscriber buffer of the notification channel.
    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// How long shutdown waits for running loops to finish their item.
    #[must_use]
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Wire and start every component.
    ///
    /// # Errors
    /// Configuration, database and scheduler failures abort startup.
    #[instrument(skip_all, fields(db_path = %self.config.database.path))]
    pub async fn start(self) -> Result<Runtime> {
        let Self { config, clock: clock_config, channel_capacity, drain_timeout } = self;
        crate::config::validate(&config)?;

        let db = open_database(PathBuf::from(&config.database.path), config.database.pool_size)
            .await?;
        let queue: Arc<dyn WorkQueueStore> = Arc::new(SqliteWorkQueueRepository::new(db.clone()));
        let checkpoints: Arc<dyn CheckpointStore> =
            Arc::new(SqliteCheckpointRepository::new(db.clone()));
        let tracker = CycleTracker::new(queue, checkpoints.clone());
        let channel = Arc::new(InProcessChannel::new(channel_capacity));

        let mut registry = WorkerRegistry::builder();
        let mut timetables = Vec::new();
        for worker in config.enabled_workers() {
            let scheduler = build_scheduler(worker, tracker.clone(), channel.clone())?;
            timetables.push((
                scheduler.clone(),
                WorkerTimetable {
                    policy: worker.activation_policy(),
                    initializer: worker.initializer_schedule.clone(),
                },
            ));
            registry = registry.register(scheduler)?;
        }
        let registry = Arc::new(registry.build());

        let availability = AvailabilityListener::attach(registry.clone(), channel.as_ref())?;

        let mut clock = CronActivationClock::new(clock_config);
        for (scheduler, timetable) in timetables {
            clock.register(scheduler, timetable)?;
        }
        clock.start().await?;

        let resumed = registry.resume_in_progress(checkpoints.as_ref()).await?;
        info!(workers = registry.len(), resumed = resumed.len(), "darceo scheduler started");

        Ok(Runtime {
            config,
            db,
            channel,
            registry,
            clock,
            availability: Some(availability),
            drain_timeout,
        })
    }
}

/// Running scheduler process.
pub struct Runtime {
    config: Config,
    db: Arc<DbManager>,
    channel: Arc<InProcessChannel>,
    registry: Arc<WorkerRegistry>,
    clock: CronActivationClock,
    availability: Option<Subscription>,
    drain_timeout: Duration,
}

impl Runtime {
    /// Validated configuration the runtime was started with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared connection pool.
    pub fn db(&self) -> &Arc<DbManager> {
        &self.db
    }

    /// Channel carrying reports and availability notifications.
    pub fn channel(&self) -> Arc<dyn NotificationChannel> {
        self.channel.clone()
    }

    /// Schedulers of all enabled workers.
    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Scheduler of the named worker.
    pub fn worker(&self, name: &WorkerName) -> Option<&Scheduler> {
        self.registry.get(name)
    }

    /// Stop the clock, let every loop finish its current item and close the
    /// channel.
    ///
    /// # Errors
    /// Returns the clock's stop failure after the remaining steps ran.
    #[instrument(skip_all)]
    pub async fn shutdown(mut self) -> Result<()> {
        let clock_result = if self.clock.is_running() {
            self.clock.stop().await.map_err(DarceoError::from)
        } else {
            Ok(())
        };

        self.registry.stop_all();
        if tokio::time::timeout(self.drain_timeout, self.registry.join_all()).await.is_err() {
            warn!(
                timeout_secs = self.drain_timeout.as_secs(),
                "worker loops still running after drain timeout"
            );
        }

        self.availability.take();
        self.channel.shutdown();
        info!("darceo scheduler stopped");
        clock_result
    }
}

async fn open_database(path: PathBuf, pool_size: u32) -> Result<Arc<DbManager>> {
    task::spawn_blocking(move || {
        let db = DbManager::new(&path, pool_size)?;
        db.run_migrations()?;
        db.health_check()?;
        Ok(Arc::new(db))
    })
    .await
    .map_err(|err| DarceoError::Internal(format!("database startup task failed: {err}")))?
}

fn build_scheduler(
    worker: &WorkerConfig,
    tracker: CycleTracker,
    channel: Arc<InProcessChannel>,
) -> Result<Scheduler> {
    let options = SchedulerOptions { availability_timeout: worker.availability_timeout() };

    let scheduler = match &worker.kind {
        WorkerKind::HttpIntegrity { base_url, request_timeout_secs } => {
            let timeout = Duration::from_secs(*request_timeout_secs);
            let processor = Arc::new(HttpIntegrityProcessor::new(base_url, timeout)?);
            let source = Arc::new(HttpIdentifierSource::new(base_url, timeout)?);
            Scheduler::builder(worker.name.clone(), tracker, processor, channel)
                .work_source(source)
                .options(options)
                .build()
        }
    };

    let policy = worker.activation_policy();
    if policy.is_dormant() {
        warn!(
            worker = %worker.name,
            "worker has no activation schedule and stays dormant until activated explicitly"
        );
    }
    info!(
        worker = %worker.name,
        policy = ?policy,
        availability_timeout = ?worker.availability_timeout(),
        "worker configured"
    );
    Ok(scheduler)
}
