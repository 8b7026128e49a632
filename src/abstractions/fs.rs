//! File system abstraction
//!
//! The plan document is mutable shared state, so writes go through a
//! temp-file-and-rename to keep a read-modify-write from ever leaving a
//! half-written document behind.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Trait for file system access.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn exists(&self, path: &Path) -> bool;

    /// Read a file to a string. Missing files are an `Err`; callers decide
    /// whether that means "empty plan" or a validation failure.
    async fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write atomically (temp file + rename).
    async fn write(&self, path: &Path, content: &str) -> Result<()>;
}

/// Real file system backed by `tokio::fs`.
pub struct RealFileSystem;

#[async_trait]
impl FileSystem for RealFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    async fn write(&self, path: &Path, content: &str) -> Result<()> {
        let temp = path.with_extension("tmp");
        tokio::fs::write(&temp, content)
            .await
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        tokio::fs::rename(&temp, path)
            .await
            .with_context(|| format!("Failed to rename {} into place", temp.display()))?;
        Ok(())
    }
}

/// In-memory file system for tests.
#[derive(Default)]
pub struct InMemoryFileSystem {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.lock().await.insert(path.into(), content.into());
        self
    }

    pub async fn contents(&self, path: &Path) -> Option<String> {
        self.files.lock().await.get(path).cloned()
    }
}

#[async_trait]
impl FileSystem for InMemoryFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        self.files.lock().await.contains_key(path)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No such file: {}", path.display()))
    }

    async fn write(&self, path: &Path, content: &str) -> Result<()> {
        self.files
            .lock()
            .await
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }
}
