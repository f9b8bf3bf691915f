//! Named local snapshots of the form.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::{InputState, OutputState};

/// Metadata describing a stored scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioEntry {
    /// Absolute path to the scenario file.
    pub path: PathBuf,
    /// Human readable name.
    pub name: String,
    /// Timestamp of the snapshot.
    pub saved_at: DateTime<Utc>,
}

/// Serialized scenario file. Missing keys are filled with zero on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Name chosen when saving.
    pub name: String,
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// Form inputs at save time.
    #[serde(default)]
    pub inputs: InputState,
    /// Derived metrics at save time.
    #[serde(default)]
    pub outputs: OutputState,
}

/// Reads and writes scenario files in a single directory.
pub struct ScenarioStore {
    root: PathBuf,
}

impl ScenarioStore {
    /// Store rooted at `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the scenario files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All readable scenarios, newest first.
    pub fn entries(&self) -> Result<Vec<ScenarioEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root).context("failed to read scenario directory")? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match read_scenario(&entry.path()) {
                Ok(scenario) => entries.push(ScenarioEntry {
                    path: entry.path(),
                    name: scenario.name,
                    saved_at: scenario.saved_at,
                }),
                Err(err) => warn!("Skipping scenario {:?}: {err}", entry.path()),
            }
        }

        entries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(entries)
    }

    /// Write a new scenario and return its entry.
    pub fn save(
        &self,
        name: Option<&str>,
        inputs: &InputState,
        outputs: &OutputState,
    ) -> Result<ScenarioEntry> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;

        let saved_at = Utc::now();
        let name = name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Cenário {}", saved_at.format("%Y-%m-%d %H:%M")));
        let scenario = Scenario {
            name,
            saved_at,
            inputs: inputs.clone(),
            outputs: outputs.clone(),
        };

        let file_name = format!(
            "{}_{}.json",
            sanitize_component(&scenario.name),
            saved_at.format("%Y%m%d%H%M%S%3f")
        );
        let path = self.root.join(file_name);
        let serialized = serde_json::to_vec_pretty(&scenario)?;
        fs::write(&path, serialized).with_context(|| format!("failed to write {}", path.display()))?;

        Ok(ScenarioEntry {
            path,
            name: scenario.name,
            saved_at,
        })
    }

    /// Load the scenario behind `entry`.
    pub fn load(&self, entry: &ScenarioEntry) -> Result<Scenario> {
        read_scenario(&entry.path)
    }

    /// Most recent scenario, if any.
    pub fn latest(&self) -> Result<Option<ScenarioEntry>> {
        Ok(self.entries()?.into_iter().next())
    }

    /// Remove a scenario file.
    pub fn delete(&self, entry: &ScenarioEntry) -> Result<()> {
        fs::remove_file(&entry.path)
            .with_context(|| format!("failed to delete {}", entry.path.display()))
    }
}

fn read_scenario(path: &Path) -> Result<Scenario> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn sanitize_component(input: &str) -> String {
    let result: String = input
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
        .collect();
    if result.is_empty() {
        "scenario".to_string()
    } else {
        result
    }
}
