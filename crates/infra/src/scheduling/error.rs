//! Scheduler error types

use darceo_domain::DarceoError;
use thiserror::Error;
use tokio::task::JoinError;
use tokio::time::error::Elapsed;
use tokio_cron_scheduler::JobSchedulerError;

use crate::errors::InfraError;

/// Errors raised while driving cron jobs.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Clock is already running
    #[error("activation clock already running")]
    AlreadyRunning,

    /// Clock is not running
    #[error("activation clock not running")]
    NotRunning,

    /// Failed to create the underlying job scheduler
    #[error("failed to create job scheduler: {source}")]
    CreationFailed { source: JobSchedulerError },

    /// Failed to start the job scheduler
    #[error("failed to start job scheduler: {source}")]
    StartFailed { source: JobSchedulerError },

    /// Failed to shut the job scheduler down
    #[error("failed to stop job scheduler: {source}")]
    StopFailed { source: JobSchedulerError },

    /// Failed to register a job
    #[error("failed to register job: {source}")]
    JobRegistrationFailed { source: JobSchedulerError },

    /// Cron expression could not be parsed
    #[error("invalid cron expression '{expression}': {source}")]
    InvalidSchedule { expression: String, source: JobSchedulerError },

    /// Operation timed out
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration, source: Elapsed },

    /// Monitor task failed
    #[error("task join failed: {0}")]
    TaskJoinFailed(#[from] JoinError),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let mapped = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                DarceoError::InvalidInput(err.to_string())
            }
            SchedulerError::InvalidSchedule { .. } => DarceoError::Config(err.to_string()),
            _ => DarceoError::Internal(err.to_string()),
        };
        Self(mapped)
    }
}

impl From<SchedulerError> for DarceoError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
