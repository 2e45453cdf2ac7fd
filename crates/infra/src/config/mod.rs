//! Configuration loading
//!
//! Reads the worker configuration from TOML or JSON files, applies
//! environment overrides and validates the result, cron expressions
//! included.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths, validate};
