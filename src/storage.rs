//! Durable storage for rendered certificate documents.
//!
//! Documents are keyed by issuance id and there is never more than one file
//! per issuance: a new `put_document` replaces whatever was stored before.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A document as stored, with the filename it was saved under.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store the document for an issuance, replacing any previous one.
    async fn put_document(
        &self,
        issue_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<(), String>;

    async fn get_document(&self, issue_id: Uuid) -> Result<Option<StoredDocument>, String>;

    async fn delete_document(&self, issue_id: Uuid) -> Result<(), String>;
}

/// Filesystem-backed storage under `CERT_STORAGE_DIR`.
///
/// Each issuance owns the directory `<root>/<issue_id>/`; replacement is
/// implemented by clearing that directory before writing.
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        let root =
            std::env::var("CERT_STORAGE_DIR").unwrap_or_else(|_| "./data/issues".to_string());
        Self::new(root)
    }

    fn issue_dir(&self, issue_id: Uuid) -> PathBuf {
        self.root.join(issue_id.to_string())
    }
}

#[async_trait]
impl ObjectStorage for FilesystemStorage {
    async fn put_document(
        &self,
        issue_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<(), String> {
        let dir = self.issue_dir(issue_id);
        let filename = sanitize_filename::sanitize(filename);
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || write_replacing(&dir, &filename, &bytes))
            .await
            .map_err(|e| e.to_string())?
    }

    async fn get_document(&self, issue_id: Uuid) -> Result<Option<StoredDocument>, String> {
        let dir = self.issue_dir(issue_id);
        tokio::task::spawn_blocking(move || read_single(&dir))
            .await
            .map_err(|e| e.to_string())?
    }

    async fn delete_document(&self, issue_id: Uuid) -> Result<(), String> {
        let dir = self.issue_dir(issue_id);
        tokio::task::spawn_blocking(move || {
            if dir.is_dir() {
                fs::remove_dir_all(&dir).map_err(|e| e.to_string())
            } else {
                Ok(())
            }
        })
        .await
        .map_err(|e| e.to_string())?
    }
}

fn write_replacing(dir: &Path, filename: &str, bytes: &[u8]) -> Result<(), String> {
    // We do not know the previous file name, clear the whole directory;
    // there is only ever one document per issuance.
    if dir.is_dir() {
        fs::remove_dir_all(dir).map_err(|e| e.to_string())?;
    }
    fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    fs::write(dir.join(filename), bytes).map_err(|e| e.to_string())
}

fn read_single(dir: &Path) -> Result<Option<StoredDocument>, String> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let entry = fs::read_dir(dir)
        .map_err(|e| e.to_string())?
        .filter_map(|e| e.ok())
        .find(|e| e.path().is_file());
    match entry {
        Some(entry) => {
            let bytes = fs::read(entry.path()).map_err(|e| e.to_string())?;
            Ok(Some(StoredDocument {
                filename: entry.file_name().to_string_lossy().to_string(),
                bytes,
            }))
        }
        None => Ok(None),
    }
}

/// In-memory storage for tests and local development.
#[derive(Default)]
pub struct MemoryStorage {
    documents: RwLock<HashMap<Uuid, StoredDocument>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put_document(
        &self,
        issue_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<(), String> {
        self.documents.write().insert(
            issue_id,
            StoredDocument {
                filename: filename.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        Ok(())
    }

    async fn get_document(&self, issue_id: Uuid) -> Result<Option<StoredDocument>, String> {
        Ok(self.documents.read().get(&issue_id).cloned())
    }

    async fn delete_document(&self, issue_id: Uuid) -> Result<(), String> {
        self.documents.write().remove(&issue_id);
        Ok(())
    }
}
