use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::{RootDiagnostics, StoredTree};

/// Response for the stored-file inspection endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct FilesResponse {
    pub files: StoredTree,
}

/// Response for the root-folder diagnostic endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct TestFolderResponse {
    pub success: bool,
    pub message: String,
    pub folder: RootDiagnostics,
}
