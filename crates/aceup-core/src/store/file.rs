//! Filesystem store: one JSON document per key.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{LocalStore, StoreKey};
use crate::{Error, Result};

/// Persistent store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|error| io_error("create directory", &root, &error))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &StoreKey) -> PathBuf {
        self.root.join(key.file_name())
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn read(&self, key: &StoreKey) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(io_error("read", &path, &error)),
        }
    }

    async fn write(&self, key: &StoreKey, contents: String) -> Result<()> {
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");

        fs::write(&staging, contents)
            .await
            .map_err(|error| io_error("write", &staging, &error))?;
        // rename is atomic on the same filesystem, so readers see old or new, never half
        fs::rename(&staging, &path)
            .await
            .map_err(|error| io_error("replace", &path, &error))?;

        tracing::trace!("Wrote {}", path.display());
        Ok(())
    }

    async fn remove(&self, key: &StoreKey) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_error("remove", &path, &error)),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

fn io_error(operation: &str, path: &Path, error: &std::io::Error) -> Error {
    Error::LocalStorage(format!("failed to {operation} {}: {error}", path.display()))
}
