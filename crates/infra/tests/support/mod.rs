//! Shared helpers for `darceo-infra` integration tests: temporary
//! directories, worker configs and test logging.

use std::path::PathBuf;
use std::time::Duration;

use darceo_domain::{Config, DatabaseConfig, WorkerConfig, WorkerKind};
use tempfile::TempDir;

/// Temporary directory holding a test database and config files.
pub struct TestDir {
    pub dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self { dir: TempDir::new().expect("temp dir should be created") }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `contents` to `name` and return the full path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("config file should be written");
        path
    }

    /// Configuration with a database inside this directory.
    pub fn config(&self, workers: Vec<WorkerConfig>) -> Config {
        Config {
            database: DatabaseConfig {
                path: self.path("darceo.db").to_string_lossy().into_owned(),
                pool_size: 2,
            },
            workers,
        }
    }
}

/// Manually activated integrity worker talking to `base_url`.
pub fn integrity_worker(name: &str, base_url: &str) -> WorkerConfig {
    WorkerConfig {
        name: name.into(),
        enabled: true,
        kind: WorkerKind::HttpIntegrity { base_url: base_url.to_owned(), request_timeout_secs: 5 },
        always_active: false,
        activation_schedule: None,
        deactivation_schedule: None,
        initializer_schedule: None,
        availability_timeout_secs: None,
    }
}

/// Route tracing output through the test harness; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("darceo=debug,info"))
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or a few seconds passed.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}
