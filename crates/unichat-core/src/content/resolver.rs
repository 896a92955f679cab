//! Blob and file store access

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from content lookups
#[derive(Error, Debug)]
pub enum ContentError {
    /// Id unknown to the store
    #[error("content not found: {0}")]
    NotFound(String),

    /// Id that cannot name a stored item
    #[error("invalid content id: {0}")]
    InvalidId(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ContentResult<T> = Result<T, ContentError>;

/// Access to stored image blobs and attached files
///
/// Implementations:
/// - `MemoryContentResolver`: in-memory, for tests and embedding
/// - `DirContentResolver`: files on disk under a root directory
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Look up an image blob by id; `None` when missing
    async fn get_blob(&self, id: &str) -> Option<Vec<u8>>;

    /// Read a stored file's bytes
    async fn read_file(&self, file_id: &str) -> ContentResult<Vec<u8>>;

    /// Read a stored file as text (lossy UTF-8)
    async fn read_text(&self, file_id: &str) -> ContentResult<String> {
        let bytes = self.read_file(file_id).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// In-memory content store
#[derive(Default)]
pub struct MemoryContentResolver {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryContentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an image blob
    pub fn insert_blob(&self, id: impl Into<String>, data: Vec<u8>) {
        self.blobs.write().insert(id.into(), data);
    }

    /// Store a file
    pub fn insert_file(&self, id: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.write().insert(id.into(), data.into());
    }

    /// Builder-style blob insert
    pub fn with_blob(self, id: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert_blob(id, data);
        self
    }

    /// Builder-style file insert
    pub fn with_file(self, id: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert_file(id, data);
        self
    }
}

#[async_trait]
impl ContentResolver for MemoryContentResolver {
    async fn get_blob(&self, id: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(id).cloned()
    }

    async fn read_file(&self, file_id: &str) -> ContentResult<Vec<u8>> {
        self.files
            .read()
            .get(file_id)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(file_id.to_string()))
    }
}

/// Directory-backed content store
///
/// Blobs live in `<root>/blobs/<id>`, files in `<root>/files/<id>`.
#[derive(Debug, Clone)]
pub struct DirContentResolver {
    root: PathBuf,
}

impl DirContentResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_path(&self, kind: &str, id: &str) -> ContentResult<PathBuf> {
        if id.is_empty() || id.contains('/') || id.contains('\\') || id == "." || id == ".." {
            return Err(ContentError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(kind).join(id))
    }
}

#[async_trait]
impl ContentResolver for DirContentResolver {
    async fn get_blob(&self, id: &str) -> Option<Vec<u8>> {
        let path = self.item_path("blobs", id).ok()?;
        tokio::fs::read(path).await.ok()
    }

    async fn read_file(&self, file_id: &str) -> ContentResult<Vec<u8>> {
        let path = self.item_path("files", file_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ContentError::NotFound(file_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_resolver() {
        let store = MemoryContentResolver::new()
            .with_blob("img1", vec![1, 2, 3])
            .with_file("notes", "hello");

        assert_eq!(store.get_blob("img1").await, Some(vec![1, 2, 3]));
        assert_eq!(store.get_blob("missing").await, None);
        assert_eq!(store.read_text("notes").await.unwrap(), "hello");
        assert!(matches!(store.read_file("nope").await, Err(ContentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dir_resolver() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("blobs")).unwrap();
        std::fs::create_dir_all(dir.path().join("files")).unwrap();
        std::fs::write(dir.path().join("blobs").join("a"), [9u8, 8]).unwrap();
        std::fs::write(dir.path().join("files").join("doc"), "body").unwrap();

        let store = DirContentResolver::new(dir.path());
        assert_eq!(store.get_blob("a").await, Some(vec![9, 8]));
        assert_eq!(store.read_text("doc").await.unwrap(), "body");
        assert!(matches!(store.read_file("gone").await, Err(ContentError::NotFound(_))));
        assert!(matches!(store.read_file("../doc").await, Err(ContentError::InvalidId(_))));
    }
}
