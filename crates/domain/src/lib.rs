//! # darceo Domain
//!
//! Domain types shared by the work-cycle scheduler crates.
//!
//! This crate contains:
//! - Identifiers for workers and work items
//! - Checkpoint and pending-item records
//! - Processing outcomes, findings and reports
//! - Configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other darceo crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
