//! Cron-driven activation of workers
//!
//! The activation clock owns every timer: activation windows,
//! deactivation, and periodic work initialisation. Each timer only flips
//! state on a [`darceo_core::Scheduler`]; the work itself runs in the
//! scheduler's own loop task.

pub mod activation_clock;
pub mod error;

pub use activation_clock::{
    validate_cron, ActivationClockConfig, CronActivationClock, WorkerTimetable,
};
pub use error::{SchedulerError, SchedulerResult};
