//! Firebase Storage backend (Google Cloud Storage bucket).
//!
//! Objects are written with a public-read ACL under the key prefix
//! `FormHouse/service/sanitized_user/`, so every stored document gets a
//! stable public URL. Authentication reuses the service-account token source
//! shared with the Drive adapter.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::config::FirebaseStorageConfig;
use crate::errors::{Error, Result};
use crate::storage::google_auth::{ServiceAccountKey, TokenSource};
use crate::storage::{
    Destination, StorageAdapter, SubmissionMetadata, UploadFile, UploadedFileRecord, metadata_filename,
    sanitize_segment, timestamped_filename,
};

const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const KEY_PREFIX: &str = "FormHouse";

pub struct FirebaseStorage {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    bucket: String,
    max_file_size: u64,
    upload_base: String,
    public_base: String,
}

impl FirebaseStorage {
    /// Build the adapter from configuration. The bucket defaults to the
    /// project's standard `<project_id>.appspot.com` bucket when not set.
    pub fn from_config(config: &FirebaseStorageConfig) -> anyhow::Result<Self> {
        let key = ServiceAccountKey::from_file(&config.credentials_file)?;
        let bucket = match (&config.bucket, key.project_id.as_deref()) {
            (Some(bucket), _) => bucket.clone(),
            (None, Some(project)) => format!("{project}.appspot.com"),
            (None, None) => anyhow::bail!("no bucket configured and the key file carries no project_id"),
        };
        let tokens = Arc::new(TokenSource::new(key, STORAGE_SCOPE, reqwest::Client::new())?);
        Ok(Self {
            http: reqwest::Client::new(),
            tokens,
            bucket,
            max_file_size: config.max_file_size,
            upload_base: "https://storage.googleapis.com/upload/storage/v1".to_string(),
            public_base: "https://storage.googleapis.com".to_string(),
        })
    }

    #[cfg(test)]
    fn with_base_urls(mut self, upload_base: &str, public_base: &str) -> Self {
        self.upload_base = upload_base.to_string();
        self.public_base = public_base.to_string();
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(&self, object: &str, mime_type: &str, body: Vec<u8>) -> Result<String> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| Error::StorageUnavailable {
                message: format!("Could not authenticate with Firebase Storage: {e:#}"),
            })?;

        let response = self
            .http
            .post(format!("{}/b/{}/o", self.upload_base, self.bucket))
            .query(&[
                ("uploadType", "media"),
                ("name", object),
                ("predefinedAcl", "publicRead"),
            ])
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"))
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(body)
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::UNAUTHORIZED => Error::PermissionDenied {
                    resource: format!("bucket \"{}\"", self.bucket),
                    message: "Grant the service account the Storage Object Admin role on the bucket".to_string(),
                },
                reqwest::StatusCode::NOT_FOUND => Error::NotFound {
                    resource: format!("bucket \"{}\"", self.bucket),
                    message: "Check the configured bucket name".to_string(),
                },
                _ => Error::Other(anyhow::anyhow!("firebase storage returned {status}: {body}")),
            });
        }

        Ok(format!("{}/{}/{object}", self.public_base, self.bucket))
    }
}

#[async_trait]
impl StorageAdapter for FirebaseStorage {
    fn provider_name(&self) -> &'static str {
        "firebase"
    }

    fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    async fn resolve_destination(&self, _service_key: &str, service_name: &str, user_name: &str) -> Result<Destination> {
        // Object stores have no folders; the destination is a key prefix
        let prefix = format!(
            "{KEY_PREFIX}/{}/{}",
            sanitize_segment(service_name),
            sanitize_segment(user_name)
        );
        Ok(Destination {
            name: prefix.clone(),
            location: prefix,
        })
    }

    async fn upload(&self, dest: &Destination, file: &UploadFile) -> Result<UploadedFileRecord> {
        let saved_name = timestamped_filename(&file.original_name, Utc::now());
        let object = format!("{}/{saved_name}", dest.location);
        let mime_type = mime_guess::from_path(&file.original_name)
            .first_or_octet_stream()
            .to_string();
        let url = self.put_object(&object, &mime_type, file.content.to_vec()).await?;

        Ok(UploadedFileRecord {
            original_name: file.original_name.clone(),
            saved_name: Some(saved_name),
            storage_id: Some(object),
            url: Some(url),
            size: file.size(),
        })
    }

    async fn write_metadata(&self, dest: &Destination, meta: &SubmissionMetadata) -> Result<UploadedFileRecord> {
        let name = metadata_filename(meta.submitted_at);
        let object = format!("{}/{name}", dest.location);
        let body = serde_json::to_vec_pretty(meta).map_err(anyhow::Error::from)?;
        let size = body.len() as u64;
        let url = self.put_object(&object, "application/json", body).await?;

        Ok(UploadedFileRecord {
            original_name: name.clone(),
            saved_name: Some(name),
            storage_id: Some(object),
            url: Some(url),
            size,
        })
    }
}
