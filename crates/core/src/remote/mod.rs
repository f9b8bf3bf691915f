//! Contract with the spreadsheet-backed calculation service.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::SyncResult,
    state::{InputState, RawFields},
};

/// HTTP implementation of [`RemoteStore`].
pub mod http;

pub use http::HttpRemote;

/// Endpoint receiving workbook uploads.
pub const UPLOAD_PATH: &str = "upload-excel";
/// Endpoint persisting the input parameters.
pub const UPDATE_PATH: &str = "update-excel";
/// Endpoint returning the canonical sheet state.
pub const READ_PATH: &str = "read-excel";
/// Endpoint returning the derived metrics.
pub const CALCULATE_PATH: &str = "calculate";

/// Acknowledgement returned by write endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Outcome label, e.g. `success`.
    #[serde(default)]
    pub status: Option<String>,
    /// Human readable note.
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a successful `/read-excel` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    /// Input values as stored in the sheet.
    #[serde(rename = "inputData")]
    pub input_data: RawFields,
    /// Output values, absent in services that only echo inputs.
    #[serde(rename = "outputData", default, skip_serializing_if = "Option::is_none")]
    pub output_data: Option<RawFields>,
}

/// Body of a successful `/calculate` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculateResponse {
    /// Derived metrics keyed like the output catalog.
    pub data: RawFields,
}

/// Remote store of record for inputs and derived outputs.
///
/// Every method is a single request; implementations never retry.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload a workbook file.
    async fn upload(&self, file_name: &str, contents: Vec<u8>) -> SyncResult<Acknowledgement>;

    /// Persist the given inputs.
    async fn update(&self, inputs: &InputState) -> SyncResult<Acknowledgement>;

    /// Read canonical state, optionally naming the workbook to read.
    async fn read(&self, file_path: Option<&str>) -> SyncResult<ReadResponse>;

    /// Request derived outputs for the given inputs.
    async fn calculate(&self, inputs: &InputState) -> SyncResult<CalculateResponse>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn upload(&self, file_name: &str, contents: Vec<u8>) -> SyncResult<Acknowledgement> {
        (**self).upload(file_name, contents).await
    }

    async fn update(&self, inputs: &InputState) -> SyncResult<Acknowledgement> {
        (**self).update(inputs).await
    }

    async fn read(&self, file_path: Option<&str>) -> SyncResult<ReadResponse> {
        (**self).read(file_path).await
    }

    async fn calculate(&self, inputs: &InputState) -> SyncResult<CalculateResponse> {
        (**self).calculate(inputs).await
    }
}
