#![warn(clippy::all, missing_docs)]

//! Core logic for the Brickwise investment dashboard.
//!
//! This crate hosts the field catalogs, keyed form state, number
//! localization, configuration, the remote calculation client and the
//! form-sync orchestrator used by the terminal UI and any future frontends.

pub mod catalog;
pub mod config;
pub mod error;
pub mod format;
pub mod orchestrator;
pub mod remote;
pub mod scenario;
pub mod state;

pub use config::AppConfig;
pub use error::{SyncError, SyncResult};
pub use orchestrator::{FormSnapshot, FormSync, SyncOptions};
pub use remote::{HttpRemote, RemoteStore};
pub use scenario::{Scenario, ScenarioEntry, ScenarioStore};
pub use state::{InputState, OutputState, UiStatus};
