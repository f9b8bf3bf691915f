mod app;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    sync::Mutex,
};

use brickwise_core::{
    config::{self, AppConfig},
    FormSync, HttpRemote, ScenarioStore, SyncOptions,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config_path = config::ensure_default_config()?;
    let config = AppConfig::load()?;
    info!(
        path = %config_path.display(),
        service_url = %config.service_url,
        "Configuration loaded"
    );

    let remote = HttpRemote::from_config(&config).context("failed to build HTTP client")?;
    let sync = FormSync::new(remote, SyncOptions::from_config(&config));
    let scenarios = ScenarioStore::new(config.scenario_root());

    let mut app = app::DashboardApp::new(sync, scenarios, config.load_on_start);
    app.run().await
}

/// File-only logging: the dashboard owns stdout while it runs.
fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("brickwise.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
