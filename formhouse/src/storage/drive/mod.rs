//! Google Drive storage backend.
//!
//! Drive is the one backend where "put this file under root/service/user"
//! is not a plain path write. Service accounts own no storage quota, and
//! Drive will happily create a "child" folder in the account's own private
//! area when the nominal parent is not properly shared, a failure mode that
//! looks exactly like success. Folder resolution therefore verifies two
//! things before any file is placed:
//!
//! - **ancestry**: the resolved folder's parent chain reaches the trusted
//!   root (walked with a visited set, so cyclic or repeated parent links
//!   terminate),
//! - **capability**: the service account can create children in it.
//!
//! Both checks are repeated per upload because resolution and upload are
//! separated in time and the destination may have been moved since.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OnceCell;

use crate::config::DriveStorageConfig;
use crate::errors::{Error, Result};
use crate::storage::google_auth::{ServiceAccountKey, TokenSource};
use crate::storage::{
    Destination, RootDiagnostics, StorageAdapter, SubmissionMetadata, UploadFile, UploadedFileRecord,
    metadata_filename, sanitize_segment, timestamped_filename,
};

pub mod api;

use api::{DriveApi, DriveApiError, FolderNode, HttpDriveApi};

/// Folder searched for when no root reference is configured.
const ROOT_FOLDER_NAME: &str = "FormHouse";

pub struct DriveStorage {
    api: Arc<dyn DriveApi>,
    actor_email: String,
    root_reference: Option<String>,
    max_file_size: u64,
    // Resolved trusted-root id, cached after the first successful resolution
    root_id: OnceCell<String>,
}

impl DriveStorage {
    /// Build the adapter from configuration. Reads and validates the service
    /// account key eagerly so credential problems surface at startup.
    pub fn from_config(config: &DriveStorageConfig) -> anyhow::Result<Self> {
        let key = ServiceAccountKey::from_file(&config.credentials_file)?;
        let actor_email = key.client_email.clone();
        let tokens = Arc::new(TokenSource::new(key, api::DRIVE_SCOPE, reqwest::Client::new())?);
        Ok(Self {
            api: Arc::new(HttpDriveApi::new(reqwest::Client::new(), tokens)),
            actor_email,
            root_reference: config.root_folder.clone(),
            max_file_size: config.max_file_size,
            root_id: OnceCell::new(),
        })
    }

    /// Test constructor taking any [`DriveApi`] implementation.
    #[cfg(test)]
    fn with_api(api: Arc<dyn DriveApi>, actor_email: &str, root_reference: Option<&str>, max_file_size: u64) -> Self {
        Self {
            api,
            actor_email: actor_email.to_string(),
            root_reference: root_reference.map(str::to_string),
            max_file_size,
            root_id: OnceCell::new(),
        }
    }

    pub fn service_account_email(&self) -> &str {
        &self.actor_email
    }

    fn sharing_remediation(&self) -> String {
        format!(
            "Share the \"{ROOT_FOLDER_NAME}\" folder with {} as Editor and try again",
            self.actor_email
        )
    }

    /// Resolve the trusted root folder id, from the configured reference or
    /// by searching for a folder named "FormHouse".
    async fn trusted_root(&self) -> Result<&str> {
        let id = self
            .root_id
            .get_or_try_init(|| async {
                match &self.root_reference {
                    Some(reference) => extract_folder_id(reference),
                    None => match self.api.find_folder_by_name(ROOT_FOLDER_NAME).await {
                        Ok(Some(folder)) => Ok(folder.id),
                        Ok(None) => Err(Error::NotFound {
                            resource: format!("\"{ROOT_FOLDER_NAME}\" folder"),
                            message: format!(
                                "Create a folder named \"{ROOT_FOLDER_NAME}\" in Google Drive and share it with {} as Editor",
                                self.actor_email
                            ),
                        }),
                        Err(e) => Err(self.map_api_error(e, ROOT_FOLDER_NAME)),
                    },
                }
            })
            .await?;
        Ok(id)
    }

    fn map_api_error(&self, err: DriveApiError, resource: &str) -> Error {
        match err {
            DriveApiError::NotFound => Error::NotFound {
                resource: format!("folder \"{resource}\""),
                message: self.sharing_remediation(),
            },
            DriveApiError::PermissionDenied(_) => Error::PermissionDenied {
                resource: format!("folder \"{resource}\""),
                message: self.sharing_remediation(),
            },
            DriveApiError::QuotaExceeded => Error::StorageQuotaUnavailable {
                message: format!(
                    "Service accounts have no storage quota of their own. {}",
                    self.sharing_remediation()
                ),
            },
            DriveApiError::Other(e) => Error::Other(e),
        }
    }

    /// Find or create a folder named `name` directly under `parent`, then
    /// verify ancestry (parent chain reaches `trusted_root`) and capability
    /// (the account can create children in it). Never returns an id for a
    /// folder that fails either check.
    async fn ensure_child(&self, parent: &str, name: &str, trusted_root: &str) -> Result<String> {
        let folder_id = match self
            .api
            .find_child_folder(parent, name)
            .await
            .map_err(|e| self.map_api_error(e, name))?
        {
            Some(existing) => {
                tracing::debug!(folder = name, id = %existing.id, "Found existing folder");
                existing.id
            }
            None => {
                // Check the parent is writable before creating: Drive would
                // otherwise fall back to the account's private area.
                let parent_node = self
                    .api
                    .get_folder(parent)
                    .await
                    .map_err(|e| self.map_api_error(e, parent))?;
                if !parent_node.can_add_children {
                    return Err(Error::PermissionDenied {
                        resource: format!("folder \"{}\"", parent_node.name),
                        message: self.sharing_remediation(),
                    });
                }

                let created = self
                    .api
                    .create_folder(parent, name)
                    .await
                    .map_err(|e| self.map_api_error(e, name))?;
                tracing::info!(folder = name, id = %created.id, "Created folder");
                self.grant_writer_best_effort(&created).await;
                created.id
            }
        };

        self.verify_ancestry(&folder_id, name, trusted_root).await?;

        let resolved = self
            .api
            .get_folder(&folder_id)
            .await
            .map_err(|e| self.map_api_error(e, name))?;
        if !resolved.can_add_children {
            return Err(Error::PermissionDenied {
                resource: format!("folder \"{}\"", resolved.name),
                message: self.sharing_remediation(),
            });
        }

        Ok(folder_id)
    }

    /// Grant the acting account writer access on a folder it just created.
    /// Best effort: creation already succeeded, so a failed grant is logged
    /// and not fatal.
    async fn grant_writer_best_effort(&self, folder: &FolderNode) {
        let already_writer = match self.api.list_permissions(&folder.id).await {
            Ok(permissions) => permissions.iter().any(|p| {
                p.email_address.as_deref() == Some(self.actor_email.as_str())
                    && matches!(p.role.as_str(), "writer" | "owner" | "organizer" | "fileOrganizer")
            }),
            Err(e) => {
                tracing::warn!(folder = %folder.name, "Could not list permissions: {e}");
                false
            }
        };
        if already_writer {
            return;
        }
        if let Err(e) = self.api.grant_writer(&folder.id, &self.actor_email).await {
            tracing::warn!(folder = %folder.name, "Could not grant writer access: {e}");
        }
    }

    /// Walk the folder's parent chain upward until the trusted root is
    /// reached. A chain that exhausts without reaching the root means the
    /// folder was placed outside the shared tree.
    async fn verify_ancestry(&self, folder_id: &str, folder_name: &str, trusted_root: &str) -> Result<()> {
        if folder_id == trusted_root {
            return Ok(());
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut pending = vec![folder_id.to_string()];

        while let Some(id) = pending.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let node = match self.api.get_folder(&id).await {
                Ok(node) => node,
                // A parent we cannot see cannot vouch for ancestry; keep
                // walking the other branches.
                Err(DriveApiError::NotFound) | Err(DriveApiError::PermissionDenied(_)) => continue,
                Err(e) => return Err(self.map_api_error(e, folder_name)),
            };
            for parent in node.parents {
                if parent == trusted_root {
                    return Ok(());
                }
                if !visited.contains(&parent) {
                    pending.push(parent);
                }
            }
        }

        Err(Error::OrphanedLocation {
            folder: folder_name.to_string(),
            message: format!(
                "It was created in the service account's own storage instead of the shared tree. {}",
                self.sharing_remediation()
            ),
        })
    }
}

#[async_trait]
impl StorageAdapter for DriveStorage {
    fn provider_name(&self) -> &'static str {
        "drive"
    }

    fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    async fn resolve_destination(&self, _service_key: &str, service_name: &str, user_name: &str) -> Result<Destination> {
        let root = self.trusted_root().await?.to_string();
        let service_folder = self.ensure_child(&root, service_name, &root).await?;
        let user_folder_name = sanitize_segment(user_name);
        let user_folder = self.ensure_child(&service_folder, &user_folder_name, &root).await?;
        Ok(Destination {
            location: user_folder,
            name: user_folder_name,
        })
    }

    async fn upload(&self, dest: &Destination, file: &UploadFile) -> Result<UploadedFileRecord> {
        let root = self.trusted_root().await?.to_string();
        // The destination may have been moved since resolution
        self.verify_ancestry(&dest.location, &dest.name, &root).await?;

        let saved_name = timestamped_filename(&file.original_name, Utc::now());
        let mime_type = mime_guess::from_path(&file.original_name)
            .first_or_octet_stream()
            .to_string();
        let uploaded = self
            .api
            .upload_file(&dest.location, &saved_name, &mime_type, file.content.clone())
            .await
            .map_err(|e| self.map_api_error(e, &file.original_name))?;

        Ok(UploadedFileRecord {
            original_name: file.original_name.clone(),
            saved_name: Some(uploaded.name),
            storage_id: Some(uploaded.id),
            url: uploaded.web_view_link,
            size: file.size(),
        })
    }

    async fn write_metadata(&self, dest: &Destination, meta: &SubmissionMetadata) -> Result<UploadedFileRecord> {
        let root = self.trusted_root().await?.to_string();
        self.verify_ancestry(&dest.location, &dest.name, &root).await?;

        let name = metadata_filename(meta.submitted_at);
        let body = serde_json::to_vec_pretty(meta).map_err(anyhow::Error::from)?;
        let size = body.len() as u64;
        let uploaded = self
            .api
            .upload_file(&dest.location, &name, "application/json", body.into())
            .await
            .map_err(|e| self.map_api_error(e, &name))?;

        Ok(UploadedFileRecord {
            original_name: name,
            saved_name: Some(uploaded.name),
            storage_id: Some(uploaded.id),
            url: uploaded.web_view_link,
            size,
        })
    }

    async fn diagnose_root(&self) -> Result<RootDiagnostics> {
        let root = self.trusted_root().await?.to_string();
        let node = self
            .api
            .get_folder(&root)
            .await
            .map_err(|e| self.map_api_error(e, ROOT_FOLDER_NAME))?;
        if !node.can_add_children {
            return Err(Error::PermissionDenied {
                resource: format!("folder \"{}\"", node.name),
                message: self.sharing_remediation(),
            });
        }
        Ok(RootDiagnostics {
            folder_id: node.id,
            folder_name: node.name,
            service_account_email: self.actor_email.clone(),
        })
    }
}

/// Accept a bare folder id or a Drive folder URL and return the id.
fn extract_folder_id(reference: &str) -> Result<String> {
    fn is_id_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '-' || c == '_'
    }
    fn leading_id(s: &str) -> Option<String> {
        let id: String = s.chars().take_while(|&c| is_id_char(c)).collect();
        (!id.is_empty()).then_some(id)
    }

    let reference = reference.trim();
    if let Some(rest) = reference.split("/folders/").nth(1)
        && let Some(id) = leading_id(rest)
    {
        return Ok(id);
    }
    if let Some(idx) = reference.find("id=")
        && let Some(id) = leading_id(&reference[idx + 3..])
    {
        return Ok(id);
    }
    if !reference.is_empty() && reference.chars().all(is_id_char) {
        return Ok(reference.to_string());
    }
    Err(Error::InvalidReference {
        reference: reference.to_string(),
    })
}
