use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use roimask_types::{config::UploadConfig, frame::ExportPair, Result};
use tracing::info;

use crate::upload_error;

/// Endpoint that accepts files and returns a processed image.
#[async_trait]
pub trait UploadEndpoint: Send + Sync {
    /// Sends raw file bytes under the `file` field; returns the response body.
    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<Vec<u8>>;
    /// Sends the image under `file` and the JSON mask under `mask`.
    async fn submit_export(&self, pair: &ExportPair) -> Result<Vec<u8>>;
}

/// Multipart HTTP client for the upload endpoint.
pub struct HttpUploadClient {
    client: Client,
    url: String,
}

impl HttpUploadClient {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| upload_error(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            url: config.upload_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, form: Form) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| upload_error(format!("request to {} failed: {err}", self.url)))?
            .error_for_status()
            .map_err(|err| upload_error(format!("server rejected upload: {err}")))?;
        let body = response
            .bytes()
            .await
            .map_err(|err| upload_error(format!("failed to read upload response: {err}")))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl UploadEndpoint for HttpUploadClient {
    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
        info!("Uploading '{}' ({} bytes) to {}", file_name, bytes.len(), self.url);
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        self.post(Form::new().part("file", part)).await
    }

    async fn submit_export(&self, pair: &ExportPair) -> Result<Vec<u8>> {
        info!(
            "Exporting {}x{} image with mask ({} bytes) to {}",
            pair.width,
            pair.height,
            pair.image_bytes.len(),
            self.url
        );
        let file = Part::bytes(pair.image_bytes.clone())
            .file_name("photo.png")
            .mime_str("image/png")
            .map_err(|err| upload_error(format!("invalid image part: {err}")))?;
        let form = Form::new()
            .part("file", file)
            .text("mask", pair.mask_json.clone());
        self.post(form).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roimask_types::RoiError;

    #[test]
    fn client_targets_configured_upload_url() {
        let client = HttpUploadClient::new(&UploadConfig::default()).expect("client");
        assert_eq!(client.url(), "http://127.0.0.1:8000/api/upload/");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_upload_error() {
        let config = UploadConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout_ms: 2_000,
            ..UploadConfig::default()
        };
        let client = HttpUploadClient::new(&config).expect("client");
        let err = client
            .upload_file("photo.png", vec![1, 2, 3])
            .await
            .expect_err("nothing listens on port 1");
        assert!(matches!(err, RoiError::Upload(_)));
    }
}
