//! # darceo Infrastructure
//!
//! Infrastructure implementations of the `darceo-core` ports.
//!
//! This crate contains:
//! - SQLite work queue and checkpoint repositories (`rusqlite` + `r2d2`)
//! - The in-process notification channel
//! - The cron activation clock
//! - HTTP integrity processor and identifier source
//! - Configuration loading and the composition root
//!
//! ## Architecture
//! - Implements traits defined in `darceo-core`
//! - Contains all "impure" code (I/O, timers, network)

pub mod bootstrap;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod messaging;
pub mod processors;
pub mod scheduling;

// Re-export commonly used items
pub use bootstrap::{Bootstrap, Runtime};
pub use database::{DbManager, SqliteCheckpointRepository, SqliteWorkQueueRepository};
pub use errors::InfraError;
pub use messaging::InProcessChannel;
pub use processors::{HttpIdentifierSource, HttpIntegrityProcessor, ReadRequest};
pub use scheduling::{CronActivationClock, SchedulerError, SchedulerResult};
