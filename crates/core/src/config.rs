//! Application configuration loaded from `~/.config/brickwise/config.toml`
//! and `BRICKWISE_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory under the user config dir holding brickwise files.
pub const CONFIG_DIR: &str = "brickwise";
/// Prefix of environment variables overriding file values.
pub const ENV_PREFIX: &str = "BRICKWISE";
/// Default location of the calculation service.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

const DEFAULT_CONFIG: &str = r#"# Brickwise dashboard configuration.

# Base URL of the spreadsheet calculation service.
service_url = "http://localhost:8000"

# Workbook passed to /read-excel. When unset the service's own sheet is read
# with a plain GET.
# read_file_path = "BUSINESS PLAN - BWI.xlsx"

# Abort remote calls after this many seconds. Unset means wait indefinitely.
# request_timeout_secs = 30

# Send the values re-read from the sheet to /calculate instead of the values
# that were just submitted.
calculate_with_reconciled_inputs = false

# Read the current sheet state when the dashboard starts.
load_on_start = true

# Where named scenarios are stored. Defaults to ~/.config/brickwise/scenarios.
# scenario_dir = "/path/to/scenarios"
"#;

/// Runtime settings for the dashboard and its remote client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Base URL of the calculation service.
    pub service_url: String,
    /// Optional workbook path sent with the reconcile read.
    #[serde(default)]
    pub read_file_path: Option<String>,
    /// Optional per-request timeout in seconds.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Use reconciled rather than submitted inputs for `/calculate`.
    #[serde(default)]
    pub calculate_with_reconciled_inputs: bool,
    /// Run the initial remote read on start-up.
    #[serde(default = "default_true")]
    pub load_on_start: bool,
    /// Override for the scenario directory.
    #[serde(default)]
    pub scenario_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            read_file_path: None,
            request_timeout_secs: None,
            calculate_with_reconciled_inputs: false,
            load_on_start: true,
            scenario_dir: None,
        }
    }
}

impl AppConfig {
    /// Load from the default config file plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (optional) plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_layered(path.as_ref(), ENV_PREFIX)
    }

    fn load_layered(path: &Path, env_prefix: &str) -> Result<Self> {
        let settings = Config::builder()
            .set_default("service_url", DEFAULT_SERVICE_URL)?
            .set_default("calculate_with_reconciled_inputs", false)?
            .set_default("load_on_start", true)?
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix(env_prefix).try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("invalid brickwise configuration")?;
        Ok(config)
    }

    /// Request timeout, if configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Directory used by the scenario store.
    pub fn scenario_root(&self) -> PathBuf {
        self.scenario_dir
            .clone()
            .unwrap_or_else(|| config_root().join("scenarios"))
    }
}

/// `~/.config/brickwise`, falling back to the working directory.
pub fn config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

/// Path of the main configuration file.
pub fn config_path() -> PathBuf {
    config_root().join("config.toml")
}

/// Write the commented default configuration when none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}
