//! # darceo Core
//!
//! Work-cycle scheduling logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the work queue, checkpoints, item
//!   processors, work sources and the notification channel
//! - The `CycleTracker` facade over queue and checkpoint storage
//! - The per-worker `Scheduler`, the `WorkerRegistry` and the
//!   `AvailabilityListener`
//!
//! ## Architecture Principles
//! - Only depends on `darceo-domain`
//! - No database, HTTP, or cron code
//! - All external collaborators via traits

pub mod cycle;
pub mod messaging;
pub mod processing;
pub mod scheduling;

pub use cycle::ports::{CheckpointStore, WorkQueueStore};
pub use cycle::CycleTracker;
pub use messaging::ports::{NotificationChannel, NotificationHandler, Subscription};
pub use processing::ports::{ItemProcessor, ProcessError, WorkSource};
pub use scheduling::{
    AvailabilityListener, Scheduler, SchedulerBuilder, SchedulerOptions, WorkerRegistry,
    WorkerRegistryBuilder,
};
