use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    error::{SyncError, SyncResult},
    state::InputState,
};

use super::{
    Acknowledgement, CalculateResponse, ReadResponse, RemoteStore, CALCULATE_PATH, READ_PATH,
    UPDATE_PATH, UPLOAD_PATH,
};

/// reqwest-backed client for the calculation service.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    http: Client,
}

impl HttpRemote {
    /// Client configured from [`AppConfig`].
    pub fn from_config(config: &AppConfig) -> SyncResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(config.service_url.clone(), builder.build()?))
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(endpoint: &'static str, response: Response) -> SyncResult<T> {
        let status = response.status();
        let body = response.bytes().await?;
        info!(endpoint, status = status.as_u16(), bytes = body.len(), "Remote call finished");

        if !status.is_success() {
            let error = match serde_json::from_slice::<Value>(&body) {
                Ok(value) => SyncError::from_error_body(status.as_u16(), &value),
                Err(_) => {
                    let text = String::from_utf8_lossy(&body).trim().to_string();
                    let detail = if text.is_empty() {
                        status
                            .canonical_reason()
                            .unwrap_or("request failed")
                            .to_string()
                    } else {
                        text
                    };
                    SyncError::Remote {
                        status: status.as_u16(),
                        detail,
                    }
                }
            };
            warn!(endpoint, status = status.as_u16(), %error, "Remote call rejected");
            return Err(error);
        }

        serde_json::from_slice(&body).map_err(|err| SyncError::Decode {
            endpoint,
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn upload(&self, file_name: &str, contents: Vec<u8>) -> SyncResult<Acknowledgement> {
        debug!(file_name, bytes = contents.len(), "Uploading workbook");
        let part = multipart::Part::bytes(contents).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.endpoint(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await?;
        Self::decode(UPLOAD_PATH, response).await
    }

    async fn update(&self, inputs: &InputState) -> SyncResult<Acknowledgement> {
        let response = self
            .http
            .post(self.endpoint(UPDATE_PATH))
            .json(inputs)
            .send()
            .await?;
        Self::decode(UPDATE_PATH, response).await
    }

    async fn read(&self, file_path: Option<&str>) -> SyncResult<ReadResponse> {
        let request = match file_path {
            Some(path) => self
                .http
                .post(self.endpoint(READ_PATH))
                .json(&json!({ "filePath": path })),
            None => self.http.get(self.endpoint(READ_PATH)),
        };
        let response = request.send().await?;
        Self::decode(READ_PATH, response).await
    }

    async fn calculate(&self, inputs: &InputState) -> SyncResult<CalculateResponse> {
        let response = self
            .http
            .post(self.endpoint(CALCULATE_PATH))
            .json(inputs)
            .send()
            .await?;
        Self::decode(CALCULATE_PATH, response).await
    }
}
