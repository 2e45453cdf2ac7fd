//! Configuration loader
//!
//! ## Loading Strategy
//! 1. `DARCEO_CONFIG` names the config file, if set
//! 2. Otherwise the standard locations are probed
//! 3. Without any file the defaults are used (no workers)
//! 4. `DARCEO_DB_PATH` and `DARCEO_DB_POOL_SIZE` override the database
//!    section
//! 5. The result is validated, cron expressions included
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./darceo.toml`, `./darceo.json`, `./config.toml`, `./config.json`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};

use darceo_domain::{ActivationPolicy, Config, DarceoError, DatabaseConfig, Result};
use tracing::{debug, info, warn};

use crate::scheduling::validate_cron;

/// Path of the configuration file.
pub const CONFIG_PATH_VAR: &str = "DARCEO_CONFIG";
/// Override of `database.path`.
pub const DB_PATH_VAR: &str = "DARCEO_DB_PATH";
/// Override of `database.pool_size`.
pub const DB_POOL_SIZE_VAR: &str = "DARCEO_DB_POOL_SIZE";

const FILE_NAMES: [&str; 4] = ["darceo.toml", "darceo.json", "config.toml", "config.json"];

/// Load, override and validate the configuration.
///
/// # Errors
/// Returns `DarceoError::Config` if:
/// - `DARCEO_CONFIG` points at a missing or unreadable file
/// - The file format is invalid
/// - An override cannot be parsed
/// - Validation fails
pub fn load() -> Result<Config> {
    let mut config = match std::env::var(CONFIG_PATH_VAR) {
        Ok(path) => read_config(Path::new(&path))?,
        Err(_) => match probe_config_paths() {
            Some(path) => read_config(&path)?,
            None => {
                warn!("no configuration file found, using defaults without workers");
                Config::default()
            }
        },
    };

    apply_env_overrides(&mut config.database)?;
    validate(&config)?;
    info!(workers = config.workers.len(), db_path = %config.database.path, "configuration loaded");
    Ok(config)
}

/// Database-only configuration taken from the environment.
///
/// # Errors
/// Returns `DarceoError::Config` if `DARCEO_DB_PATH` is missing or the pool
/// size is not a number.
pub fn load_from_env() -> Result<Config> {
    let path = std::env::var(DB_PATH_VAR).map_err(|_| {
        DarceoError::Config(format!("missing required environment variable: {DB_PATH_VAR}"))
    })?;

    let mut config = Config {
        database: DatabaseConfig { path, ..DatabaseConfig::default() },
        workers: Vec::new(),
    };
    apply_env_overrides(&mut config.database)?;
    validate(&config)?;
    Ok(config)
}

/// Load and validate a configuration file.
///
/// If `path` is `None`, the standard locations are probed.
///
/// # Errors
/// Returns `DarceoError::Config` if the file is missing, malformed or
/// invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(path) => path,
        None => probe_config_paths().ok_or_else(|| {
            DarceoError::Config("no config file found in any of the standard locations".into())
        })?,
    };

    let config = read_config(&config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Structural validation plus cron syntax of every worker schedule.
///
/// # Errors
/// `DarceoError::Config` describing the first problem found.
pub fn validate(config: &Config) -> Result<()> {
    config.validate()?;

    for worker in &config.workers {
        let mut expressions = Vec::new();
        if let ActivationPolicy::Scheduled { activate, deactivate } = worker.activation_policy() {
            expressions.push(activate);
            expressions.push(deactivate);
        }
        expressions.extend(worker.initializer_schedule.clone());

        for expression in expressions {
            validate_cron(&expression).map_err(|err| {
                DarceoError::Config(format!("worker '{}': {err}", worker.name))
            })?;
        }
    }
    Ok(())
}

/// First existing config file among the standard locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Ok(exe) = std::env::current_exe() {
        roots.extend(exe.parent().map(Path::to_path_buf));
    }

    roots
        .iter()
        .flat_map(|root| FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|candidate| candidate.is_file())
}

fn read_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(DarceoError::Config(format!("config file not found: {}", path.display())));
    }

    info!(path = %path.display(), "loading configuration from file");
    let contents = std::fs::read_to_string(path)
        .map_err(|e| DarceoError::Config(format!("failed to read config file: {e}")))?;
    parse_config(&contents, path)
}

/// Parse configuration, choosing the format by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DarceoError::Config(format!("invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DarceoError::Config(format!("invalid JSON format: {e}"))),
        other => Err(DarceoError::Config(format!("unsupported config format: {other}"))),
    }
}

fn apply_env_overrides(database: &mut DatabaseConfig) -> Result<()> {
    if let Ok(path) = std::env::var(DB_PATH_VAR) {
        debug!(path = %path, "database path overridden from environment");
        database.path = path;
    }
    if let Ok(raw) = std::env::var(DB_POOL_SIZE_VAR) {
        database.pool_size = raw.parse().map_err(|e| {
            DarceoError::Config(format!("invalid {DB_POOL_SIZE_VAR} '{raw}': {e}"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use darceo_domain::WorkerKind;

    use super::*;

    const TOML: &str = r#"
[database]
path = "darceo-test.db"
pool_size = 2

[[workers]]
name = "integrity"
activation_schedule = "0 0 22 * * *"
deactivation_schedule = "0 0 6 * * *"
initializer_schedule = "0 30 21 * * *"
availability_timeout_secs = 900

[workers.kind]
type = "http_integrity"
base_url = "http://zmd.local/api"
"#;

    #[test]
    fn parses_toml_workers() {
        let config = parse_config(TOML, Path::new("darceo.toml")).unwrap();

        assert_eq!(config.database.pool_size, 2);
        let worker = &config.workers[0];
        assert!(worker.enabled);
        assert_eq!(
            worker.kind,
            WorkerKind::HttpIntegrity {
                base_url: "http://zmd.local/api".into(),
                request_timeout_secs: 60
            }
        );
        assert!(matches!(worker.activation_policy(), ActivationPolicy::Scheduled { .. }));
        validate(&config).expect("valid configuration");
    }

    #[test]
    fn parses_json_workers() {
        let json = r#"{
            "database": { "path": "darceo.db", "pool_size": 4 },
            "workers": [{
                "name": "formats",
                "always_active": true,
                "kind": { "type": "http_integrity", "base_url": "https://zmd.local" }
            }]
        }"#;

        let config = parse_config(json, Path::new("config.json")).unwrap();
        assert_eq!(config.workers[0].activation_policy(), ActivationPolicy::AlwaysActive);
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = parse_config("", Path::new("darceo.yaml")).unwrap_err();
        assert!(matches!(err, DarceoError::Config(msg) if msg.contains("yaml")));
    }

    #[test]
    fn rejects_malformed_cron() {
        let broken = TOML.replace("0 0 6 * * *", "at dawn");
        let config = parse_config(&broken, Path::new("darceo.toml")).unwrap();

        let err = validate(&config).unwrap_err();
        assert!(matches!(err, DarceoError::Config(msg) if msg.contains("integrity")));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/darceo.toml"))).unwrap_err();
        assert!(matches!(err, DarceoError::Config(_)));
    }
}
