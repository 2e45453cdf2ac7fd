//! Work-cycle scheduling: per-worker schedulers, the registry that owns them
//! and the listener that wakes them on availability notifications.

pub mod listener;
pub mod registry;
pub mod scheduler;

pub use listener::AvailabilityListener;
pub use registry::{WorkerRegistry, WorkerRegistryBuilder};
pub use scheduler::{Scheduler, SchedulerBuilder, SchedulerOptions};
