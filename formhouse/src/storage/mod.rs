//! Storage adapter abstraction layer.
//!
//! This module defines the [`StorageAdapter`] trait which abstracts durable
//! persistence of submitted files and metadata across the supported backends
//! (local disk, Google Drive, Firebase Storage, Cloudinary). The submission
//! handler is written once against this trait; the concrete adapter is
//! selected from configuration at startup by [`create_adapter`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::errors::{Error, Result};

pub mod cloudinary;
pub mod drive;
pub mod firebase;
pub mod google_auth;
pub mod local;

/// One file drained from the submit form, held in memory for the duration of
/// the request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub original_name: String,
    pub content: Bytes,
}

impl UploadFile {
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Durable record of one stored file. Created per file per submission and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileRecord {
    pub original_name: String,
    /// Name the file was stored under, when the provider renames on save
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_name: Option<String>,
    /// Provider-side identifier (Drive file id, Cloudinary public id, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
    /// URL the stored file can be viewed at, where the provider has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub size: u64,
}

/// Submission record written once, as JSON, alongside the uploaded files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMetadata {
    pub id: Uuid,
    pub service: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub submitted_at: DateTime<Utc>,
    pub files: Vec<UploadedFileRecord>,
}

/// Opaque destination handle returned by [`StorageAdapter::resolve_destination`].
///
/// The location is provider-specific: a directory path for local storage, a
/// verified folder id for Drive, an object-key prefix for the others. Callers
/// treat it as a token to pass back to `upload`/`write_metadata`.
#[derive(Debug, Clone)]
pub struct Destination {
    pub location: String,
    /// Human-readable label for the location (folder name, path, key
    /// prefix), used in error messages where the raw id would be opaque.
    pub name: String,
}

/// Tree of stored files, keyed service -> users -> files. Produced by the
/// local adapter for the inspection endpoint.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct StoredTree {
    pub services: BTreeMap<String, Vec<StoredUser>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoredUser {
    pub user: String,
    pub files: Vec<StoredFile>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoredFile {
    pub name: String,
    pub path: String,
    pub size: u64,
}

/// Result of checking the trusted root folder's reachability and capability.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RootDiagnostics {
    pub folder_id: String,
    pub folder_name: String,
    pub service_account_email: String,
}

/// Abstract storage backend interface.
///
/// Implementors persist submitted files and their metadata under the logical
/// path `root/service/sanitized_user`. A destination resolved once is reused
/// for every file of a submission; implementations are free to re-verify it
/// before each write (the Drive adapter does).
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Provider name as reported by `/api/health`
    fn provider_name(&self) -> &'static str;

    /// Per-file size ceiling in bytes
    fn max_file_size(&self) -> u64;

    /// Resolve (creating if necessary) the storage location for one
    /// service/user pair. `user_name` is the raw submitted name; adapters
    /// sanitize it before using it as a path segment.
    async fn resolve_destination(&self, service_key: &str, service_name: &str, user_name: &str) -> Result<Destination>;

    /// Persist one file under the resolved destination.
    async fn upload(&self, dest: &Destination, file: &UploadFile) -> Result<UploadedFileRecord>;

    /// Persist the submission metadata record adjacent to the files.
    async fn write_metadata(&self, dest: &Destination, meta: &SubmissionMetadata) -> Result<UploadedFileRecord>;

    /// Enumerate stored files per service/user. Only the local adapter
    /// supports this.
    async fn list_stored(&self) -> Result<StoredTree> {
        Err(unsupported(self.provider_name(), "file listing"))
    }

    /// Check the trusted root folder's reachability and write capability.
    /// Only the Drive adapter supports this.
    async fn diagnose_root(&self) -> Result<RootDiagnostics> {
        Err(unsupported(self.provider_name(), "root folder diagnostics"))
    }
}

fn unsupported(provider: &str, what: &str) -> Error {
    Error::Unsupported {
        message: format!("{what} is not supported by the {provider} storage provider"),
    }
}

/// Build the configured storage adapter.
///
/// This is the single point where configuration becomes an adapter instance.
/// Missing or unreadable credentials leave storage unconfigured (a warning is
/// logged and submissions are rejected with 503) rather than aborting
/// startup, so the frontend keeps working while the operator fixes setup.
/// Local-disk failures do abort: an unwritable upload root is not a
/// credentials problem.
pub fn create_adapter(config: &StorageConfig) -> anyhow::Result<Option<Arc<dyn StorageAdapter>>> {
    match config {
        StorageConfig::None => {
            tracing::warn!("No storage provider configured; submissions will be rejected");
            Ok(None)
        }
        StorageConfig::Local(local) => {
            let adapter = local::LocalStorage::new(local.clone())?;
            tracing::info!(root = %local.root.display(), "Local storage initialized");
            Ok(Some(Arc::new(adapter)))
        }
        StorageConfig::Drive(drive_cfg) => match drive::DriveStorage::from_config(drive_cfg) {
            Ok(adapter) => {
                tracing::info!(
                    service_account = %adapter.service_account_email(),
                    "Google Drive storage initialized; share the FormHouse folder with this address"
                );
                Ok(Some(Arc::new(adapter)))
            }
            Err(e) => {
                tracing::warn!("Google Drive storage disabled: {e:#}");
                Ok(None)
            }
        },
        StorageConfig::Firebase(firebase_cfg) => match firebase::FirebaseStorage::from_config(firebase_cfg) {
            Ok(adapter) => {
                tracing::info!(bucket = %adapter.bucket(), "Firebase storage initialized");
                Ok(Some(Arc::new(adapter)))
            }
            Err(e) => {
                tracing::warn!("Firebase storage disabled: {e:#}");
                Ok(None)
            }
        },
        StorageConfig::Cloudinary(cloudinary_cfg) => match cloudinary::CloudinaryStorage::from_config(cloudinary_cfg) {
            Some(adapter) => {
                tracing::info!(cloud = %adapter.cloud_name(), "Cloudinary storage initialized");
                Ok(Some(Arc::new(adapter)))
            }
            None => {
                tracing::warn!("Cloudinary credentials incomplete; storage disabled");
                Ok(None)
            }
        },
    }
}

/// Replace every character outside `[A-Za-z0-9]` in a trimmed name with `_`.
///
/// Invariant: the same input always maps to the same output, and the result
/// is safe as a filesystem path segment or URL component.
pub fn sanitize_segment(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Strip any path components from a client-supplied filename.
///
/// Uploaded filenames come straight off the wire and may contain separators;
/// only the final component is ever used.
pub fn base_file_name(original: &str) -> &str {
    original.rsplit(['/', '\\']).next().unwrap_or(original)
}

/// Saved-name scheme for providers that rename on save: original stem plus a
/// millisecond timestamp, preserving the extension.
pub fn timestamped_filename(original: &str, now: DateTime<Utc>) -> String {
    let name = base_file_name(original);
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };
    format!("{stem}_{}{ext}", now.timestamp_millis())
}

/// Name of the per-submission metadata file.
pub fn metadata_filename(now: DateTime<Utc>) -> String {
    format!("metadata_{}.json", now.timestamp_millis())
}
