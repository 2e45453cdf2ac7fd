//! Notification channel adapters

pub mod in_process;

pub use in_process::InProcessChannel;
