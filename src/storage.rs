//! # Storage Module
//!
//! Local filesystem access for the GRIB cache and rendered maps.
//!
//! Writes are atomic: data goes to a sibling `<name>.partial` file which is
//! renamed over the final path once complete. A reader therefore never sees
//! a half-written cache file, and a failed write leaves nothing under the
//! final name.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use eclipse_clouds::storage::{LocalStorage, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = LocalStorage;
//!     if !storage.exists("2024040100168.grib").await? {
//!         storage.write("2024040100168.grib", b"GRIB...").await?;
//!     }
//!     let data = storage.read("2024040100168.grib").await?;
//!     println!("{} bytes", data.len());
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Suffix of in-progress writes
pub const PARTIAL_SUFFIX: &str = "partial";

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid path format: {0}")]
    InvalidPath(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait defining the interface for storage backends
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Reads the entire contents of a file
    ///
    /// # Errors
    /// Returns `StorageError::PathNotFound` if nothing exists at `path`
    async fn read(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Writes data to a file in full, replacing any previous content
    ///
    /// # Errors
    /// Returns `StorageError` if the file cannot be written
    async fn write(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    /// Checks if a file exists at the given path
    async fn exists(&self, path: &str) -> StorageResult<bool>;
}

/// Local filesystem storage backend
#[derive(Debug, Clone, Default)]
pub struct LocalStorage;

impl LocalStorage {
    /// Path of the in-progress file for `path`
    pub fn partial_path(path: &str) -> StorageResult<PathBuf> {
        let target = Path::new(path);
        let file_name = target
            .file_name()
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        let mut partial = file_name.to_os_string();
        partial.push(".");
        partial.push(PARTIAL_SUFFIX);
        Ok(target.with_file_name(partial))
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        match fs::read(path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::PathNotFound(path.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(StorageError::PermissionDenied(path.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn write(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(StorageError::Io)?;
        }

        let partial = Self::partial_path(path)?;
        let written = match fs::write(&partial, data).await {
            Ok(()) => fs::rename(&partial, path).await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => Ok(()),
            Err(e) => {
                // Best effort cleanup, the write error is returned
                let _ = fs::remove_file(&partial).await;
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    Err(StorageError::PermissionDenied(path.to_string()))
                } else {
                    Err(StorageError::Io(e))
                }
            }
        }
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
