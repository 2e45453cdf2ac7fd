//! darceo work-cycle scheduler daemon
//!
//! Loads the configuration, starts every configured worker and runs until
//! interrupted. Running loops finish their current item before exit.

mod logging;

use anyhow::{Context, Result};
use darceo_infra::{config, Bootstrap};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    logging::init(logging::LogFormat::from_env())?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(error = %err, "could not load .env file"),
    }

    let config = config::load().context("loading configuration")?;
    let runtime = Bootstrap::new(config).start().await.context("starting scheduler")?;

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown requested");

    runtime.shutdown().await.context("stopping scheduler")?;
    Ok(())
}
