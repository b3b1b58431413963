use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::UploadedFileRecord;

/// Response for a successful document submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub data: SubmitData,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitData {
    /// Display name of the service the documents were filed under
    pub service: String,
    pub files_uploaded: usize,
    pub files: Vec<UploadedFileRecord>,
}
