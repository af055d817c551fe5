//! Durable local filesystem store
//!
//! Primary persistence for metadata records and per-project vector files.
//! Paths are relative to a configured root; writes go through a temp file
//! and rename so a crash mid-write never leaves a torn file behind.

use super::{StorageError, StorageResult};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Filesystem-backed durable store
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Create with a temp directory (for tests)
    #[cfg(test)]
    pub fn temp() -> std::io::Result<(tempfile::TempDir, Self)> {
        let dir = tempfile::tempdir()?;
        let store = Self::new(dir.path())?;
        Ok((dir, store))
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Write a file atomically (temp file + rename) and fsync it
    pub async fn write(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        // Yield so long write bursts cooperate with the runtime
        tokio::task::yield_now().await;

        let full_path = self.full_path(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = full_path.with_extension("tmp");
        fs::write(&tmp_path, data)?;
        let file = File::open(&tmp_path)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &full_path)?;

        Ok(())
    }

    /// Read an entire file
    pub async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        tokio::task::yield_now().await;

        let full_path = self.full_path(path);
        if !full_path.exists() {
            return Err(StorageError::NotFound {
                key: path.to_string(),
            });
        }

        Ok(fs::read(&full_path)?)
    }

    /// Check if a file exists
    pub fn exists(&self, path: &str) -> bool {
        self.full_path(path).exists()
    }

    /// Delete a file (absent files are not an error)
    pub async fn delete(&self, path: &str) -> StorageResult<()> {
        let full_path = self.full_path(path);
        if full_path.exists() {
            fs::remove_file(&full_path)?;
        }
        Ok(())
    }

    /// Remove a directory and everything under it
    pub async fn delete_dir(&self, path: &str) -> StorageResult<()> {
        let full_path = self.full_path(path);
        if full_path.is_dir() {
            fs::remove_dir_all(&full_path)?;
        }
        Ok(())
    }

    /// List immediate child directory names under a path
    pub fn list_dirs(&self, path: &str) -> StorageResult<Vec<String>> {
        let full_path = self.full_path(path);
        let mut names = Vec::new();

        if full_path.is_dir() {
            for entry in fs::read_dir(&full_path)? {
                let entry = entry?;
                if entry.path().is_dir() {
                    names.push(entry.file_name().to_string_lossy().to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Get the root path (for diagnostics)
    pub fn root_path(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (_dir, store) = LocalStore::temp().unwrap();

        store.write("projects/demo/records.json", b"[]").await.unwrap();
        assert!(store.exists("projects/demo/records.json"));

        let data = store.read("projects/demo/records.json").await.unwrap();
        assert_eq!(data, b"[]");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_dir, store) = LocalStore::temp().unwrap();
        let err = store.read("nope.bin").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_dirs_sorted() {
        let (_dir, store) = LocalStore::temp().unwrap();
        store.write("projects/b/records.json", b"[]").await.unwrap();
        store.write("projects/a/records.json", b"[]").await.unwrap();

        let dirs = store.list_dirs("projects").unwrap();
        assert_eq!(dirs, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_dir_removes_project() {
        let (_dir, store) = LocalStore::temp().unwrap();
        store.write("projects/p/records.json", b"[]").await.unwrap();
        store.write("projects/p/vectors.bin", b"").await.unwrap();

        store.delete_dir("projects/p").await.unwrap();
        assert!(!store.exists("projects/p/records.json"));
        assert!(store.list_dirs("projects").unwrap().is_empty());
    }
}
