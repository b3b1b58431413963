//! Thin Google Drive v3 client.
//!
//! [`DriveApi`] is the seam between the folder-resolution logic in the parent
//! module and the wire. The HTTP implementation lives here; tests drive the
//! resolution logic against an in-memory fake instead. Errors are classified
//! into the cases the resolver cares about (missing, forbidden, quota) so it
//! never has to inspect HTTP bodies itself.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;

use crate::storage::google_auth::TokenSource;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const FOLDER_FIELDS: &str = "id,name,parents,capabilities/canAddChildren";

#[derive(Debug, thiserror::Error)]
pub enum DriveApiError {
    #[error("not found")]
    NotFound,
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Folder as seen by the resolver: identity, parent links, and whether the
/// acting account may create children inside it.
#[derive(Debug, Clone, Deserialize)]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub can_add_children: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub web_view_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Permission {
    pub role: String,
    pub email_address: Option<String>,
}

/// Drive operations used by the folder resolver and uploader.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Non-trashed child folder of `parent_id` with the exact `name`, if any.
    async fn find_child_folder(&self, parent_id: &str, name: &str) -> Result<Option<FolderNode>, DriveApiError>;

    /// Any non-trashed folder with the exact `name` visible to the account.
    /// Used only to locate an unconfigured root.
    async fn find_folder_by_name(&self, name: &str) -> Result<Option<FolderNode>, DriveApiError>;

    async fn get_folder(&self, id: &str) -> Result<FolderNode, DriveApiError>;

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<FolderNode, DriveApiError>;

    async fn list_permissions(&self, id: &str) -> Result<Vec<Permission>, DriveApiError>;

    /// Grant `email` writer access to the folder.
    async fn grant_writer(&self, id: &str, email: &str) -> Result<(), DriveApiError>;

    async fn upload_file(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: &str,
        content: Bytes,
    ) -> Result<DriveFile, DriveApiError>;
}

/// Production implementation over the Drive v3 REST API.
pub struct HttpDriveApi {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    api_base: String,
    upload_base: String,
}

impl HttpDriveApi {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenSource>) -> Self {
        Self::with_base_urls(
            http,
            tokens,
            "https://www.googleapis.com/drive/v3",
            "https://www.googleapis.com/upload/drive/v3",
        )
    }

    /// Base URLs are injectable so tests can point at a mock server.
    pub fn with_base_urls(
        http: reqwest::Client,
        tokens: Arc<TokenSource>,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            api_base: api_base.into(),
            upload_base: upload_base.into(),
        }
    }

    async fn bearer(&self) -> Result<String, DriveApiError> {
        let token = self.tokens.access_token().await?;
        Ok(format!("Bearer {token}"))
    }

    async fn search(&self, query: String) -> Result<Option<FolderNode>, DriveApiError> {
        #[derive(Deserialize)]
        struct FileList {
            #[serde(default)]
            files: Vec<RawFolder>,
        }

        let fields = format!("files({FOLDER_FIELDS})");
        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .query(&[
                ("q", query.as_str()),
                ("fields", fields.as_str()),
                ("pageSize", "1"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        let list: FileList = read_json(response).await?;
        Ok(list.files.into_iter().next().map(FolderNode::from))
    }
}

/// Drive's wire shape for a folder, with capabilities nested.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFolder {
    id: String,
    name: String,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    capabilities: RawCapabilities,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCapabilities {
    #[serde(default)]
    can_add_children: bool,
}

impl From<RawFolder> for FolderNode {
    fn from(raw: RawFolder) -> Self {
        FolderNode {
            id: raw.id,
            name: raw.name,
            parents: raw.parents,
            can_add_children: raw.capabilities.can_add_children,
        }
    }
}

/// Escape a name for embedding in a Drive query string.
fn escape_query_value(name: &str) -> String {
    name.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Classify a non-success Drive response into a [`DriveApiError`].
async fn classify_error(response: reqwest::Response) -> DriveApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        reqwest::StatusCode::NOT_FOUND => DriveApiError::NotFound,
        reqwest::StatusCode::FORBIDDEN if body.contains("storageQuotaExceeded") || body.contains("quotaExceeded") => {
            DriveApiError::QuotaExceeded
        }
        reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::UNAUTHORIZED => DriveApiError::PermissionDenied(body),
        _ => DriveApiError::Other(anyhow::anyhow!("drive api returned {status}: {body}")),
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, DriveApiError> {
    if !response.status().is_success() {
        return Err(classify_error(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| DriveApiError::Other(anyhow::Error::from(e).context("invalid drive api response")))
}

#[async_trait]
impl DriveApi for HttpDriveApi {
    async fn find_child_folder(&self, parent_id: &str, name: &str) -> Result<Option<FolderNode>, DriveApiError> {
        self.search(format!(
            "name='{}' and '{}' in parents and mimeType='{FOLDER_MIME}' and trashed=false",
            escape_query_value(name),
            escape_query_value(parent_id),
        ))
        .await
    }

    async fn find_folder_by_name(&self, name: &str) -> Result<Option<FolderNode>, DriveApiError> {
        self.search(format!(
            "name='{}' and mimeType='{FOLDER_MIME}' and trashed=false",
            escape_query_value(name),
        ))
        .await
    }

    async fn get_folder(&self, id: &str) -> Result<FolderNode, DriveApiError> {
        let response = self
            .http
            .get(format!("{}/files/{id}", self.api_base))
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .query(&[("fields", FOLDER_FIELDS), ("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        let raw: RawFolder = read_json(response).await?;
        Ok(raw.into())
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<FolderNode, DriveApiError> {
        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .query(&[("fields", FOLDER_FIELDS), ("supportsAllDrives", "true")])
            .json(&serde_json::json!({
                "name": name,
                "mimeType": FOLDER_MIME,
                "parents": [parent_id],
            }))
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        let raw: RawFolder = read_json(response).await?;
        Ok(raw.into())
    }

    async fn list_permissions(&self, id: &str) -> Result<Vec<Permission>, DriveApiError> {
        #[derive(Deserialize)]
        struct PermissionList {
            #[serde(default)]
            permissions: Vec<RawPermission>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RawPermission {
            role: String,
            email_address: Option<String>,
        }

        let response = self
            .http
            .get(format!("{}/files/{id}/permissions", self.api_base))
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .query(&[
                ("fields", "permissions(role,emailAddress)"),
                ("supportsAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        let list: PermissionList = read_json(response).await?;
        Ok(list
            .permissions
            .into_iter()
            .map(|p| Permission {
                role: p.role,
                email_address: p.email_address,
            })
            .collect())
    }

    async fn grant_writer(&self, id: &str, email: &str) -> Result<(), DriveApiError> {
        let response = self
            .http
            .post(format!("{}/files/{id}/permissions", self.api_base))
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .query(&[("supportsAllDrives", "true")])
            .json(&serde_json::json!({
                "type": "user",
                "role": "writer",
                "emailAddress": email,
            }))
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }
        Ok(())
    }

    async fn upload_file(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: &str,
        content: Bytes,
    ) -> Result<DriveFile, DriveApiError> {
        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id],
        });
        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")
                    .map_err(anyhow::Error::from)?,
            )
            .part(
                "media",
                reqwest::multipart::Part::stream(reqwest::Body::from(content))
                    .mime_str(mime_type)
                    .map_err(anyhow::Error::from)?,
            );

        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,name,webViewLink"),
                ("supportsAllDrives", "true"),
            ])
            .multipart(form)
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RawFile {
            id: String,
            name: String,
            web_view_link: Option<String>,
        }
        let raw: RawFile = read_json(response).await?;
        Ok(DriveFile {
            id: raw.id,
            name: raw.name,
            web_view_link: raw.web_view_link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_escaped() {
        assert_eq!(escape_query_value("O'Brien"), "O\\'Brien");
        assert_eq!(escape_query_value("plain"), "plain");
    }

    #[tokio::test]
    async fn forbidden_with_quota_reason_classifies_as_quota() {
        let response = http::Response::builder()
            .status(403)
            .body(r#"{"error":{"errors":[{"reason":"storageQuotaExceeded"}]}}"#)
            .unwrap();
        let err = classify_error(reqwest::Response::from(response)).await;
        assert!(matches!(err, DriveApiError::QuotaExceeded));
    }

    #[tokio::test]
    async fn forbidden_without_quota_reason_is_permission_denied() {
        let response = http::Response::builder()
            .status(403)
            .body(r#"{"error":{"errors":[{"reason":"insufficientFilePermissions"}]}}"#)
            .unwrap();
        let err = classify_error(reqwest::Response::from(response)).await;
        assert!(matches!(err, DriveApiError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn missing_folder_is_not_found() {
        let response = http::Response::builder().status(404).body("").unwrap();
        let err = classify_error(reqwest::Response::from(response)).await;
        assert!(matches!(err, DriveApiError::NotFound));
    }

    #[test]
    fn folder_capabilities_deserialize_from_wire_shape() {
        let raw: RawFolder = serde_json::from_str(
            r#"{"id":"f1","name":"FormHouse","parents":["root1"],"capabilities":{"canAddChildren":true}}"#,
        )
        .unwrap();
        let node = FolderNode::from(raw);
        assert!(node.can_add_children);
        assert_eq!(node.parents, vec!["root1"]);
    }
}
