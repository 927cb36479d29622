//! Flat directory store

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, warn};

use common::error::{Error, Result};

/// What a name currently refers to inside a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Missing,
    File,
    Directory,
}

/// A single directory addressed by plain file names
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens the store, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!("Opened file store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps `name` to a path inside the store.
    ///
    /// Anything other than a single plain path component is rejected with
    /// `NotFound`, so a name can never address a file outside the store.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if !is_plain_name(name) {
            return Err(Error::NotFound(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Reports whether `name` is a file, a directory or absent
    pub async fn inspect(&self, name: &str) -> Result<Entry> {
        let path = match self.resolve(name) {
            Ok(path) => path,
            Err(_) => return Ok(Entry::Missing),
        };

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Entry::Directory),
            Ok(_) => Ok(Entry::File),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entry::Missing),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores `data` under `name`, replacing any existing file atomically
    pub async fn write(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.resolve(name)?;
        let partial = self
            .root
            .join(format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple()));

        if let Err(e) = fs::write(&partial, data).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&partial, &path).await {
            warn!("Failed to move {} into place: {}", name, e);
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }

        debug!("Stored {} ({} bytes) in {}", name, data.len(), self.root.display());
        Ok(path)
    }

    /// Reads the file stored under `name`
    pub async fn read(&self, name: &str) -> Result<Bytes> {
        let path = self.resolve(name)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(name.to_string())),
            // Reading a directory fails with an OS-specific kind
            Err(_) if path.is_dir() => Err(Error::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
