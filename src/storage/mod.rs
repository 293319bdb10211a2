//! Sandboxed file storage behind the `/files/` routes.
//!
//! Every resource name is resolved relative to one root directory. Names
//! containing `..` anywhere are refused before the filesystem is touched.
//! That is a plain substring test, not canonical path containment.
//!
//! Writes take no locks: two sessions writing the same name race, and the
//! last completed write wins.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tokio::fs;

/// Errors produced by [`FileStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("resource name {0:?} contains a parent-directory reference")]
    Traversal(String),

    #[error("resource name is empty")]
    EmptyName,

    #[error("resource {0:?} not found")]
    NotFound(String),

    #[error("storage I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A directory that holds every resource addressed through `/files/<name>`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `root`. The directory is created on the
    /// first write, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a resource name to its path under the root.
    ///
    /// Leading slashes are dropped so that `//etc/passwd` stays inside the
    /// root instead of replacing it.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Traversal`] — the name contains `..`.
    /// - [`StorageError::EmptyName`] — nothing is left after the slashes.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        if name.contains("..") {
            return Err(StorageError::Traversal(name.to_owned()));
        }
        let relative = name.trim_start_matches('/');
        if relative.is_empty() {
            return Err(StorageError::EmptyName);
        }
        Ok(self.root.join(relative))
    }

    /// Reads the full contents of a resource.
    ///
    /// An empty name is treated as a resource that does not exist.
    ///
    /// # Errors
    ///
    /// [`StorageError::Traversal`], [`StorageError::NotFound`], or
    /// [`StorageError::Io`] when the file exists but cannot be read.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = match self.resolve(name) {
            Err(StorageError::EmptyName) => return Err(StorageError::NotFound(name.to_owned())),
            other => other?,
        };
        fs::read(&path).await.map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(name.to_owned()),
            _ => StorageError::Io { path, source },
        })
    }

    /// Creates the root if needed and writes `contents` to the resource,
    /// replacing whatever was there.
    ///
    /// # Errors
    ///
    /// [`StorageError::Traversal`], [`StorageError::EmptyName`], or
    /// [`StorageError::Io`] if the root cannot be created or the write fails.
    pub async fn write(&self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(name)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StorageError::Io {
                path: self.root.clone(),
                source,
            })?;
        fs::write(&path, contents)
            .await
            .map_err(|source| StorageError::Io { path, source })
    }
}
