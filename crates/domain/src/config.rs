//! Configuration structures
//!
//! Loaded by `darceo_infra::config` from TOML/JSON files or the environment.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DB_PATH, DEFAULT_DB_POOL_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::{DarceoError, Result, WorkerName};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub workers: Vec<WorkerConfig>,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DB_PATH.to_string(), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

/// One scheduled worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub name: WorkerName,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub kind: WorkerKind,
    /// Active from startup and never deactivated by the clock.
    #[serde(default)]
    pub always_active: bool,
    /// Cron expression (seconds first) that activates the worker.
    #[serde(default)]
    pub activation_schedule: Option<String>,
    /// Cron expression (seconds first) that deactivates the worker.
    #[serde(default)]
    pub deactivation_schedule: Option<String>,
    /// Cron expression that seeds a new cycle and starts the worker.
    #[serde(default)]
    pub initializer_schedule: Option<String>,
    /// Give up waiting for an unavailable item after this many seconds and
    /// retry it. Absent means wait for the availability notification forever.
    #[serde(default)]
    pub availability_timeout_secs: Option<u64>,
}

/// Processing capability backing a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerKind {
    /// Fetches each object over HTTP and verifies its SHA-256 digest.
    HttpIntegrity {
        base_url: String,
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
}

/// How the activation clock drives a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationPolicy {
    /// Activated once at startup, never deactivated.
    AlwaysActive,
    /// Activated and deactivated by cron expressions.
    Scheduled { activate: String, deactivate: String },
    /// Registered but dormant: the clock never switches it on, only an
    /// explicit `activate` call does.
    Manual,
}

impl ActivationPolicy {
    /// Whether the activation clock leaves the worker switched off.
    pub const fn is_dormant(&self) -> bool {
        matches!(self, Self::Manual)
    }
}

impl WorkerConfig {
    /// Derive the activation policy from the schedule fields.
    pub fn activation_policy(&self) -> ActivationPolicy {
        if self.always_active {
            return ActivationPolicy::AlwaysActive;
        }
        match (&self.activation_schedule, &self.deactivation_schedule) {
            (Some(activate), Some(deactivate)) => ActivationPolicy::Scheduled {
                activate: activate.clone(),
                deactivate: deactivate.clone(),
            },
            _ => ActivationPolicy::Manual,
        }
    }

    /// Availability wait timeout, if configured.
    pub fn availability_timeout(&self) -> Option<Duration> {
        self.availability_timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.name.as_str().trim().is_empty() {
            return Err(DarceoError::Config("worker name must not be empty".into()));
        }

        let has_activation = self.activation_schedule.is_some();
        let has_deactivation = self.deactivation_schedule.is_some();
        if self.always_active && (has_activation || has_deactivation) {
            return Err(DarceoError::Config(format!(
                "worker '{}' is always active and must not define activation schedules",
                self.name
            )));
        }
        if has_activation != has_deactivation {
            return Err(DarceoError::Config(format!(
                "worker '{}' needs both an activation and a deactivation schedule",
                self.name
            )));
        }
        if self.availability_timeout_secs == Some(0) {
            return Err(DarceoError::Config(format!(
                "worker '{}' has a zero availability timeout",
                self.name
            )));
        }

        match &self.kind {
            WorkerKind::HttpIntegrity { base_url, request_timeout_secs } => {
                if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                    return Err(DarceoError::Config(format!(
                        "worker '{}' has an invalid base_url: {base_url}",
                        self.name
                    )));
                }
                if *request_timeout_secs == 0 {
                    return Err(DarceoError::Config(format!(
                        "worker '{}' has a zero request timeout",
                        self.name
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Config {
    /// Structural validation; cron syntax is checked by the infra loader.
    ///
    /// # Errors
    /// Returns `DarceoError::Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(DarceoError::Config("database path must not be empty".into()));
        }
        if self.database.pool_size == 0 {
            return Err(DarceoError::Config("database pool size must be positive".into()));
        }

        let mut seen = HashSet::new();
        for worker in &self.workers {
            if !seen.insert(worker.name.clone()) {
                return Err(DarceoError::Config(format!("duplicate worker name '{}'", worker.name)));
            }
            worker.validate()?;
        }
        Ok(())
    }

    /// Workers that are switched on.
    pub fn enabled_workers(&self) -> impl Iterator<Item = &WorkerConfig> {
        self.workers.iter().filter(|worker| worker.enabled)
    }
}

const fn default_true() -> bool {
    true
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
