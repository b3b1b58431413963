//! Stored-file inspection and storage diagnostics.
//!
//! Both endpoints are provider-dependent: file enumeration only exists on
//! the local adapter and the root-folder diagnostic only on Drive. Other
//! providers answer 400 via the adapter trait's default implementations.

use axum::{Json, extract::State};
use std::sync::Arc;

use crate::AppState;
use crate::api::models::storage::{FilesResponse, TestFolderResponse};
use crate::errors::{Error, Result};
use crate::storage::StorageAdapter;

fn configured_storage(state: &AppState) -> Result<Arc<dyn StorageAdapter>> {
    state.storage.clone().ok_or_else(|| Error::StorageUnavailable {
        message: "Storage is not configured".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/files",
    tag = "storage",
    summary = "List stored files",
    description = "Enumerate stored files per service and user. Local storage only.",
    responses(
        (status = 200, description = "Stored file tree", body = FilesResponse),
        (status = 400, description = "Provider does not support listing"),
        (status = 503, description = "Storage not configured")
    )
)]
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FilesResponse>> {
    let storage = configured_storage(&state)?;
    let files = storage.list_stored().await?;
    Ok(Json(FilesResponse { files }))
}

#[utoipa::path(
    get,
    path = "/api/test-folder",
    tag = "storage",
    summary = "Check the shared root folder",
    description = "Verify the trusted root folder is reachable and writable. Google Drive only.",
    responses(
        (status = 200, description = "Root folder is reachable and writable", body = TestFolderResponse),
        (status = 400, description = "Provider has no root folder to check"),
        (status = 503, description = "Root folder missing, unshared, or not writable")
    )
)]
pub async fn test_folder(State(state): State<AppState>) -> Result<Json<TestFolderResponse>> {
    let storage = configured_storage(&state)?;
    let folder = storage.diagnose_root().await?;
    Ok(Json(TestFolderResponse {
        success: true,
        message: format!(
            "Folder \"{}\" is reachable and writable by {}",
            folder.folder_name, folder.service_account_email
        ),
        folder,
    }))
}
