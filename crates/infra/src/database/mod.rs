//! SQLite persistence for work queues and checkpoints

pub mod checkpoint_repository;
pub mod manager;
pub mod work_queue_repository;

pub use checkpoint_repository::SqliteCheckpointRepository;
pub use manager::{DbManager, SqliteConnection, SqlitePool};
pub use work_queue_repository::SqliteWorkQueueRepository;
