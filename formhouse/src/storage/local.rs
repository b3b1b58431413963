//! Local filesystem storage backend.
//!
//! Files land under `root/service/sanitized_user/`, saved with a timestamp
//! suffix to avoid collisions, and each submission's metadata JSON sits next
//! to them. Useful for development and for deployments that do not want a
//! cloud provider. This is the only adapter that supports enumeration for
//! `GET /api/files`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;

use crate::config::LocalStorageConfig;
use crate::errors::Result;
use crate::storage::{
    Destination, StorageAdapter, StoredFile, StoredTree, StoredUser, SubmissionMetadata, UploadFile, UploadedFileRecord,
    metadata_filename, sanitize_segment, timestamped_filename,
};

pub struct LocalStorage {
    root: PathBuf,
    max_file_size: u64,
}

impl LocalStorage {
    /// Create the adapter, ensuring the upload root exists.
    pub fn new(config: LocalStorageConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.root)
            .with_context(|| format!("failed to create upload root {}", config.root.display()))?;
        Ok(Self {
            root: config.root,
            max_file_size: config.max_file_size,
        })
    }

    fn relative_to_root<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    fn provider_name(&self) -> &'static str {
        "local"
    }

    fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    async fn resolve_destination(&self, service_key: &str, _service_name: &str, user_name: &str) -> Result<Destination> {
        let dir = self.root.join(sanitize_segment(service_key)).join(sanitize_segment(user_name));
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create submission directory {}", dir.display()))?;
        Ok(Destination {
            name: self.relative_to_root(&dir).to_string_lossy().into_owned(),
            location: dir.to_string_lossy().into_owned(),
        })
    }

    async fn upload(&self, dest: &Destination, file: &UploadFile) -> Result<UploadedFileRecord> {
        let saved_name = timestamped_filename(&file.original_name, Utc::now());
        let path = Path::new(&dest.location).join(&saved_name);
        fs::write(&path, &file.content)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        Ok(UploadedFileRecord {
            original_name: file.original_name.clone(),
            saved_name: Some(saved_name),
            storage_id: Some(self.relative_to_root(&path).to_string_lossy().into_owned()),
            url: None,
            size: file.size(),
        })
    }

    async fn write_metadata(&self, dest: &Destination, meta: &SubmissionMetadata) -> Result<UploadedFileRecord> {
        let name = metadata_filename(meta.submitted_at);
        let path = Path::new(&dest.location).join(&name);
        let body = serde_json::to_vec_pretty(meta).context("failed to serialize submission metadata")?;
        let size = body.len() as u64;
        fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        Ok(UploadedFileRecord {
            original_name: name.clone(),
            saved_name: Some(name),
            storage_id: Some(self.relative_to_root(&path).to_string_lossy().into_owned()),
            url: None,
            size,
        })
    }

    async fn list_stored(&self) -> Result<StoredTree> {
        let mut tree = StoredTree::default();

        let mut services = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            // An upload root that never saw a submission is an empty tree
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(tree),
            Err(e) => return Err(anyhow::Error::from(e).context("failed to read upload root").into()),
        };

        while let Some(service_entry) = services.next_entry().await.context("failed to enumerate services")? {
            if !service_entry.file_type().await.context("stat failed")?.is_dir() {
                continue;
            }
            let service = service_entry.file_name().to_string_lossy().into_owned();

            let mut users = Vec::new();
            let mut user_dirs = fs::read_dir(service_entry.path()).await.context("failed to enumerate users")?;
            while let Some(user_entry) = user_dirs.next_entry().await.context("failed to enumerate users")? {
                if !user_entry.file_type().await.context("stat failed")?.is_dir() {
                    continue;
                }
                let user = user_entry.file_name().to_string_lossy().into_owned();

                let mut files = Vec::new();
                let mut file_entries = fs::read_dir(user_entry.path()).await.context("failed to enumerate files")?;
                while let Some(file_entry) = file_entries.next_entry().await.context("failed to enumerate files")? {
                    let name = file_entry.file_name().to_string_lossy().into_owned();
                    // Metadata records are bookkeeping, not submitted documents
                    if name.starts_with("metadata_") {
                        continue;
                    }
                    let size = file_entry.metadata().await.context("stat failed")?.len();
                    files.push(StoredFile {
                        path: format!("{service}/{user}/{name}"),
                        name,
                        size,
                    });
                }

                users.push(StoredUser { user, files });
            }

            tree.services.insert(service, users);
        }

        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use uuid::Uuid;

    fn adapter(root: &Path) -> LocalStorage {
        LocalStorage::new(LocalStorageConfig {
            root: root.to_path_buf(),
            max_file_size: 10 * 1024 * 1024,
        })
        .unwrap()
    }

    fn sample_file(name: &str, bytes: usize) -> UploadFile {
        UploadFile {
            original_name: name.to_string(),
            content: Bytes::from(vec![0u8; bytes]),
        }
    }

    #[tokio::test]
    async fn stores_files_under_service_and_sanitized_user() {
        let dir = tempfile::tempdir().unwrap();
        let storage = adapter(dir.path());

        let dest = storage.resolve_destination("pan", "PAN Card", "A B").await.unwrap();
        assert!(dest.location.ends_with("pan/A_B"));

        let record = storage.upload(&dest, &sample_file("id.pdf", 2048)).await.unwrap();
        assert_eq!(record.size, 2048);
        let saved = record.saved_name.as_deref().unwrap();
        assert!(saved.starts_with("id_") && saved.ends_with(".pdf"));
        assert!(dir.path().join("pan/A_B").join(saved).exists());
    }

    #[tokio::test]
    async fn metadata_lands_next_to_the_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = adapter(dir.path());
        let dest = storage.resolve_destination("pan", "PAN Card", "A B").await.unwrap();

        let record = storage.upload(&dest, &sample_file("id.pdf", 16)).await.unwrap();
        let meta = SubmissionMetadata {
            id: Uuid::new_v4(),
            service: "PAN Card".into(),
            name: "A B".into(),
            phone: "9999999999".into(),
            email: "a@b.com".into(),
            submitted_at: Utc::now(),
            files: vec![record],
        };

        let meta_record = storage.write_metadata(&dest, &meta).await.unwrap();
        let meta_path = dir.path().join("pan/A_B").join(meta_record.saved_name.unwrap());
        let raw = std::fs::read_to_string(meta_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["phone"], "9999999999");
        assert_eq!(parsed["files"][0]["size"], 16);
    }

    #[tokio::test]
    async fn listing_excludes_metadata_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = adapter(dir.path());
        let dest = storage.resolve_destination("aadhar", "Aadhar Card", "Priya").await.unwrap();
        storage.upload(&dest, &sample_file("photo.png", 100)).await.unwrap();
        let meta = SubmissionMetadata {
            id: Uuid::new_v4(),
            service: "Aadhar Card".into(),
            name: "Priya".into(),
            phone: "8888888888".into(),
            email: "p@example.com".into(),
            submitted_at: Utc::now(),
            files: vec![],
        };
        storage.write_metadata(&dest, &meta).await.unwrap();

        let tree = storage.list_stored().await.unwrap();
        let users = &tree.services["aadhar"];
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user, "Priya");
        assert_eq!(users[0].files.len(), 1);
        assert!(users[0].files[0].name.starts_with("photo_"));
        assert_eq!(users[0].files[0].size, 100);
    }

    #[tokio::test]
    async fn listing_empty_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = adapter(dir.path());
        let tree = storage.list_stored().await.unwrap();
        assert!(tree.services.is_empty());
    }
}
