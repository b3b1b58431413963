//! Cloudinary storage backend (signed uploads).
//!
//! Every upload is authenticated with a request signature: the signed
//! parameters are sorted, joined `key=value` with `&`, the API secret is
//! appended, and the whole string is SHA-256 hashed. Documents (pdf/doc)
//! are uploaded as `raw` resources so Cloudinary leaves the bytes alone;
//! everything else goes through `auto` detection.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::CloudinaryStorageConfig;
use crate::errors::{Error, Result};
use crate::storage::{
    Destination, StorageAdapter, SubmissionMetadata, UploadFile, UploadedFileRecord, metadata_filename,
    sanitize_segment, timestamped_filename,
};

const FOLDER_PREFIX: &str = "FormHouse";

pub struct CloudinaryStorage {
    http: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    max_file_size: u64,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

impl CloudinaryStorage {
    /// Build the adapter when all three credentials are configured; `None`
    /// otherwise (the caller logs and leaves storage unconfigured).
    pub fn from_config(config: &CloudinaryStorageConfig) -> Option<Self> {
        let (cloud_name, api_key, api_secret) = config.credentials()?;
        Some(Self {
            http: reqwest::Client::new(),
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            max_file_size: config.max_file_size,
            api_base: "https://api.cloudinary.com/v1_1".to_string(),
        })
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.to_string();
        self
    }

    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    async fn upload_bytes(
        &self,
        folder: &str,
        public_id: &str,
        resource_type: &str,
        content: Vec<u8>,
        file_name: &str,
    ) -> Result<UploadResponse> {
        let timestamp = Utc::now().timestamp().to_string();
        let signed = [
            ("folder", folder),
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
        ];
        let signature = api_signature(&signed, &self.api_secret);

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(content).file_name(file_name.to_string()),
            )
            .text("api_key", self.api_key.clone());
        for (key, value) in signed {
            form = form.text(key, value.to_string());
        }
        form = form.text("signature", signature);

        let response = self
            .http
            .post(format!("{}/{}/{resource_type}/upload", self.api_base, self.cloud_name))
            .multipart(form)
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Error::PermissionDenied {
                    resource: format!("Cloudinary cloud \"{}\"", self.cloud_name),
                    message: "Check the configured API key and secret".to_string(),
                },
                _ => Error::Other(anyhow::anyhow!("cloudinary returned {status}: {body}")),
            });
        }

        response
            .json::<UploadResponse>()
            .await
            .map_err(|e| Error::Other(anyhow::Error::from(e).context("invalid cloudinary response")))
    }
}

/// Resource type for an uploaded document. Office documents and PDFs must go
/// up as `raw`; Cloudinary would otherwise try to treat them as media.
fn resource_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".pdf") || lower.ends_with(".doc") || lower.ends_with(".docx") || lower.ends_with(".json") {
        "raw"
    } else {
        "auto"
    }
}

/// Cloudinary request signature: sorted `key=value` pairs joined with `&`,
/// secret appended, SHA-256, lowercase hex.
fn api_signature(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort();
    let joined: Vec<String> = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect();
    let mut hasher = Sha256::new();
    hasher.update(joined.join("&"));
    hasher.update(secret);
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl StorageAdapter for CloudinaryStorage {
    fn provider_name(&self) -> &'static str {
        "cloudinary"
    }

    fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    async fn resolve_destination(&self, _service_key: &str, service_name: &str, user_name: &str) -> Result<Destination> {
        let folder = format!(
            "{FOLDER_PREFIX}/{}/{}",
            sanitize_segment(service_name),
            sanitize_segment(user_name)
        );
        Ok(Destination {
            name: folder.clone(),
            location: folder,
        })
    }

    async fn upload(&self, dest: &Destination, file: &UploadFile) -> Result<UploadedFileRecord> {
        let saved_name = timestamped_filename(&file.original_name, Utc::now());
        let response = self
            .upload_bytes(
                &dest.location,
                &saved_name,
                resource_type_for(&file.original_name),
                file.content.to_vec(),
                &saved_name,
            )
            .await?;

        Ok(UploadedFileRecord {
            original_name: file.original_name.clone(),
            saved_name: Some(saved_name),
            storage_id: Some(response.public_id),
            url: Some(response.secure_url),
            size: file.size(),
        })
    }

    async fn write_metadata(&self, dest: &Destination, meta: &SubmissionMetadata) -> Result<UploadedFileRecord> {
        let name = metadata_filename(meta.submitted_at);
        let body = serde_json::to_vec_pretty(meta).map_err(anyhow::Error::from)?;
        let size = body.len() as u64;
        let response = self.upload_bytes(&dest.location, &name, "raw", body, &name).await?;

        Ok(UploadedFileRecord {
            original_name: name.clone(),
            saved_name: Some(name),
            storage_id: Some(response.public_id),
            url: Some(response.secure_url),
            size,
        })
    }
}
