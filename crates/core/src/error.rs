//! Failures surfaced by the form-sync chain.

use serde_json::Value;
use thiserror::Error;

/// Message shown when the positivity check rejects the form.
pub const NON_POSITIVE_INPUT: &str = "All input values must be greater than 0.";

/// Error raised by the orchestrator or a [`RemoteStore`](crate::remote::RemoteStore).
///
/// `Display` yields the text shown in the error banner: remote failures show
/// the server-supplied `detail` only.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local validation rejected the form before any network call.
    #[error("{0}")]
    Validation(String),
    /// Another remote chain is still in flight.
    #[error("a request is already in progress")]
    Busy,
    /// The key is not part of the input catalog.
    #[error("unknown field: {0}")]
    UnknownField(String),
    /// The service answered with a non-success status.
    #[error("{detail}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Server-supplied explanation.
        detail: String,
    },
    /// The request never produced a response.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    /// The response body did not have the documented shape.
    #[error("invalid response from {endpoint}: {message}")]
    Decode {
        /// Endpoint path that produced the body.
        endpoint: &'static str,
        /// Decoder message.
        message: String,
    },
    /// Local file access failed.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Build a remote error from a decoded error body.
    ///
    /// A string `detail` is used verbatim; any other body (structured detail,
    /// missing field) is serialized so it can still be displayed.
    pub fn from_error_body(status: u16, body: &Value) -> Self {
        let detail = match body.get("detail") {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        };
        SyncError::Remote { status, detail }
    }
}

/// Result alias for form-sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
