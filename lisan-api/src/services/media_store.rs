//! Cloudinary media storage
//!
//! Audio is uploaded as resource type `video` with format `mp3`. Requests
//! are signed: the parameters (excluding `file`, `api_key` and the
//! signature itself) are sorted by name, joined as `k=v&k=v`, the API secret
//! is appended, and the SHA-256 hex digest is sent as `signature`.

use super::{MediaStore, ServiceError, ServiceResult};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const RESOURCE_TYPE: &str = "video";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Cloudinary upload/destroy client
pub struct CloudinaryStore {
    http_client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryStore {
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> ServiceResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            cloud_name,
            api_key,
            api_secret,
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/{}/{}", API_BASE, self.cloud_name, RESOURCE_TYPE, action)
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }
}

/// Signature over the sorted `params` followed by the API secret
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort_by_key(|(k, _)| *k);
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Public id of an uploaded asset: the URL's last path segment without
/// its extension
pub fn public_id_from_url(url: &str) -> Option<&str> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    let id = last.split('.').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload_audio(&self, audio: Vec<u8>) -> ServiceResult<String> {
        let timestamp = Self::timestamp();
        let signature = sign_params(&[("format", "mp3"), ("timestamp", timestamp.as_str())], &self.api_secret);

        let file = reqwest::multipart::Part::bytes(audio)
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("format", "mp3")
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .http_client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api(status.as_u16(), error_text));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        Ok(body.secure_url)
    }

    async fn delete_audio(&self, url: &str) -> ServiceResult<()> {
        let public_id = public_id_from_url(url)
            .ok_or_else(|| ServiceError::Parse(format!("No public id in URL: {}", url)))?;

        let timestamp = Self::timestamp();
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );

        let params = [
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .http_client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api(status.as_u16(), error_text));
        }

        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        if body.result != "ok" {
            tracing::debug!(public_id = %public_id, result = %body.result, "Destroy returned non-ok");
        }

        Ok(())
    }
}
