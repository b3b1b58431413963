//! Document submission endpoint.
//!
//! The submit handler drains the multipart stream field by field, enforcing
//! the provider's per-file size ceiling incrementally so oversized uploads
//! are rejected as early as possible. Validation happens after the drain
//! (the field order in the form is not guaranteed), then files are uploaded
//! sequentially to the resolved destination and a metadata record is written
//! alongside them.

use axum::{
    Json,
    extract::{Multipart, State},
};
use bytes::BytesMut;
use chrono::Utc;
use uuid::Uuid;

use crate::AppState;
use crate::api::models::submissions::{SubmitData, SubmitResponse};
use crate::catalog;
use crate::errors::{Error, Result};
use crate::storage::{SubmissionMetadata, UploadFile, base_file_name};

const MIB: u64 = 1024 * 1024;

#[utoipa::path(
    post,
    path = "/api/submit",
    tag = "submissions",
    summary = "Submit documents",
    description = "Submit a service request with contact details and one or more document files.",
    request_body(
        content_type = "multipart/form-data",
        description = "Fields `service`, `name`, `phone`, `email` plus repeatable file field `files`"
    ),
    responses(
        (status = 200, description = "Documents stored", body = SubmitResponse),
        (status = 400, description = "Missing or empty required field, or a file exceeds the per-file size ceiling"),
        (status = 503, description = "Storage not configured or unavailable"),
        (status = 500, description = "Unexpected internal error")
    )
)]
pub async fn submit(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<SubmitResponse>> {
    let storage = state.storage.clone().ok_or_else(|| Error::StorageUnavailable {
        message: "Storage is not configured. Please try again later or contact the administrator.".to_string(),
    })?;
    let max_file_size = storage.max_file_size();

    let mut service: Option<String> = None;
    let mut name: Option<String> = None;
    let mut phone: Option<String> = None;
    let mut email: Option<String> = None;
    let mut files: Vec<UploadFile> = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(|e| Error::Validation {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "files" => {
                let original_name = field
                    .file_name()
                    .map(|n| base_file_name(n).to_string())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "upload".to_string());

                // Enforce the ceiling while the chunks stream in to fail fast
                let mut content = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(|e| Error::Validation {
                    message: format!("Failed to read file \"{original_name}\": {e}"),
                })? {
                    content.extend_from_slice(&chunk);
                    if content.len() as u64 > max_file_size {
                        return Err(Error::FileTooLarge {
                            message: format!(
                                "File \"{original_name}\" exceeds the {} MB per-file limit",
                                max_file_size / MIB
                            ),
                        });
                    }
                }

                tracing::debug!(file = %original_name, size = content.len(), "Received file");
                files.push(UploadFile {
                    original_name,
                    content: content.freeze(),
                });
            }
            "service" => service = Some(read_text_field(field, "service").await?),
            "name" => name = Some(read_text_field(field, "name").await?),
            "phone" => phone = Some(read_text_field(field, "phone").await?),
            "email" => email = Some(read_text_field(field, "email").await?),
            other => {
                tracing::debug!(field = other, "Ignoring unknown form field");
            }
        }
    }

    let service = require_field(service, "service")?;
    let name = require_field(name, "name")?;
    let phone = require_field(phone, "phone")?;
    let email = require_field(email, "email")?;
    if files.is_empty() {
        return Err(Error::Validation {
            message: "No files uploaded".to_string(),
        });
    }

    let service_name = catalog::display_name(&service).to_string();
    let destination = storage.resolve_destination(&service, &service_name, &name).await?;

    // Sequential uploads; a single bad file is logged and skipped, while
    // destination-level failures abort the submission.
    let mut records = Vec::new();
    for file in &files {
        match storage.upload(&destination, file).await {
            Ok(record) => {
                tracing::info!(file = %record.original_name, "Uploaded file");
                records.push(record);
            }
            Err(e) if is_destination_failure(&e) => return Err(e),
            Err(e) => {
                tracing::warn!(file = %file.original_name, "Upload failed, skipping: {e}");
            }
        }
    }

    let metadata = SubmissionMetadata {
        id: Uuid::new_v4(),
        service: service_name.clone(),
        name,
        phone,
        email,
        submitted_at: Utc::now(),
        files: records.clone(),
    };
    storage.write_metadata(&destination, &metadata).await?;

    tracing::info!(
        submission = %metadata.id,
        service = %service_name,
        files_uploaded = records.len(),
        files_received = files.len(),
        "Submission stored"
    );

    Ok(Json(SubmitResponse {
        success: true,
        message: "Documents submitted successfully!".to_string(),
        data: SubmitData {
            service: service_name,
            files_uploaded: records.len(),
            files: records,
        },
    }))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String> {
    field.text().await.map_err(|e| Error::Validation {
        message: format!("Failed to read field \"{name}\": {e}"),
    })
}

fn require_field(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(Error::Validation {
            message: format!("Missing required field: {field}"),
        }),
    }
}

/// Whether an upload error condemns the destination rather than the one
/// file. Destination-level failures abort the whole submission; anything
/// else is a per-file failure and best-effort semantics apply.
fn is_destination_failure(err: &Error) -> bool {
    matches!(
        err,
        Error::PermissionDenied { .. }
            | Error::OrphanedLocation { .. }
            | Error::NotFound { .. }
            | Error::StorageQuotaUnavailable { .. }
            | Error::StorageUnavailable { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_fields_must_be_non_empty() {
        assert_eq!(require_field(Some(" A B ".into()), "name").unwrap(), "A B");
        assert!(require_field(Some("   ".into()), "name").is_err());
        assert!(require_field(None, "name").is_err());
    }

    #[test]
    fn destination_failures_are_fatal_and_file_failures_are_not() {
        assert!(is_destination_failure(&Error::OrphanedLocation {
            folder: "x".into(),
            message: "m".into(),
        }));
        assert!(is_destination_failure(&Error::StorageQuotaUnavailable { message: "m".into() }));
        assert!(!is_destination_failure(&Error::Other(anyhow::anyhow!("flaky"))));
    }
}
