//! Domain constants
//!
//! Centralized location for topic names and defaults shared by the scheduler
//! crates.

// Notification topics
pub const REPORTS_TOPIC: &str = "darceo.reports";
pub const ITEM_AVAILABLE_TOPIC: &str = "darceo.items.available";

// Database defaults
pub const DEFAULT_DB_PATH: &str = "darceo.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;

// HTTP adapter defaults
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

// Notification channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
