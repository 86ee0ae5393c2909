use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::types::{ProcessResponse, UploadOutcome};
use crate::audio::AudioBlob;
use crate::error::UploadError;

/// Default filename for uploaded recordings
pub const DEFAULT_FILE_NAME: &str = "audio.wav";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Server origin, e.g. `http://127.0.0.1:8000`
    pub base_url: String,
    /// Path of the processing endpoint
    pub endpoint_path: String,
    /// Multipart field carrying the audio
    pub field_name: String,
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            endpoint_path: "/process/".to_string(),
            field_name: "audio".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Posts finished audio to the processing endpoint
#[derive(Debug, Clone)]
pub struct UploadClient {
    client: Client,
    base_url: Url,
    endpoint: Url,
    field_name: String,
}

impl UploadClient {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| UploadError::InvalidEndpoint(format!("{}: {}", config.base_url, e)))?;
        let endpoint = base_url
            .join(&config.endpoint_path)
            .map_err(|e| UploadError::InvalidEndpoint(format!("{}: {}", config.endpoint_path, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UploadError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            endpoint,
            field_name: config.field_name.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Upload `blob` as a multipart file named `file_name`
    pub async fn upload(
        &self,
        blob: &AudioBlob,
        file_name: &str,
    ) -> Result<UploadOutcome, UploadError> {
        info!(
            "Uploading {} ({} bytes, {}) to {}",
            file_name,
            blob.len(),
            blob.media_type,
            self.endpoint
        );

        let part = Part::bytes(blob.bytes.clone())
            .file_name(file_name.to_string())
            .mime_str(&blob.media_type)
            .map_err(|e| UploadError::InvalidResponse(format!("bad media type: {}", e)))?;

        let form = Form::new().part(self.field_name.clone(), part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ProcessResponse>(&body)
                .ok()
                .and_then(|r| r.message)
                .unwrap_or_else(|| format!("Error HTTP: {}", status.as_u16()));

            error!("Upload failed ({}): {}", status.as_u16(), message);

            return Err(UploadError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ProcessResponse =
            serde_json::from_str(&body).map_err(|e| UploadError::InvalidResponse(e.to_string()))?;

        if !parsed.is_success() {
            let message = parsed
                .message
                .unwrap_or_else(|| format!("Server reported status {:?}", parsed.status));
            error!("Upload rejected: {}", message);
            return Err(UploadError::Rejected(message));
        }

        let redirect = match parsed.redirect_url.as_deref() {
            Some(location) => Some(
                self.base_url
                    .join(location)
                    .map_err(|e| UploadError::InvalidResponse(format!("{}: {}", location, e)))?,
            ),
            None => None,
        };

        info!(
            "Upload accepted{}",
            redirect
                .as_ref()
                .map(|url| format!(", redirecting to {}", url))
                .unwrap_or_default()
        );

        Ok(UploadOutcome {
            message: parsed.message,
            redirect,
        })
    }
}
