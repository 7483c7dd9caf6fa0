//! Local filesystem file store.

use crate::error::{StorageError, StorageResult};
use crate::traits::FileStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Saved files stored as flat files under a root directory.
pub struct FilesystemFiles {
    root: PathBuf,
}

impl FilesystemFiles {
    /// Create the store, creating the root directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Get the full path for a file name, with path traversal protection.
    ///
    /// Runs on the blocking pool since `canonicalize` and `symlink_metadata`
    /// touch the filesystem synchronously.
    async fn file_path(&self, name: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || Self::file_path_sync(&root, &name))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Resolve a file name to a path that cannot escape the root.
    ///
    /// File names are a single normal path component; existing entries are
    /// canonicalized so a symlink inside the root cannot point outside it.
    fn file_path_sync(root: &Path, name: &str) -> StorageResult<PathBuf> {
        if name.is_empty() || name.starts_with('.') {
            return Err(StorageError::InvalidKey(format!(
                "file name not allowed: {name:?}"
            )));
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(StorageError::InvalidKey(format!(
                    "file name must be a single path component: {name}"
                )));
            }
        }

        let path = root.join(name);

        match std::fs::symlink_metadata(&path) {
            Ok(meta) => {
                let root_canonical = root.canonicalize().map_err(|e| {
                    StorageError::Io(std::io::Error::new(
                        e.kind(),
                        format!("failed to canonicalize root: {e}"),
                    ))
                })?;
                let canonical = path.canonicalize().map_err(|e| {
                    if meta.file_type().is_symlink() {
                        StorageError::InvalidKey(format!(
                            "symlink target missing or invalid: {name}"
                        ))
                    } else {
                        StorageError::Io(std::io::Error::new(
                            e.kind(),
                            format!("failed to canonicalize path: {e}"),
                        ))
                    }
                })?;

                if !canonical.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidKey(format!(
                        "resolved path escapes storage root: {name}"
                    )));
                }
                Ok(path)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path),
            Err(err) => Err(StorageError::Io(std::io::Error::new(
                err.kind(),
                format!("failed to stat path: {err}"),
            ))),
        }
    }
}

/// A temp file under the store root, removed on drop unless renamed into place.
struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl TempFile {
    fn new(root: &Path) -> Self {
        Self {
            path: root.join(format!(".tmp.{}", Uuid::new_v4())),
            persisted: false,
        }
    }

    async fn persist(mut self, target: &Path) -> std::io::Result<()> {
        fs::rename(&self.path, target).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[async_trait]
impl FileStore for FilesystemFiles {
    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, name: &str, data: Bytes) -> StorageResult<()> {
        let path = self.file_path(name).await?;

        // Write to a uniquely named temp file, fsync, then rename over the target
        let temp = TempFile::new(&self.root);
        {
            let mut file = fs::File::create(&temp.path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        temp.persist(&path).await?;

        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, name: &str) -> StorageResult<Option<Bytes>> {
        let path = self.file_path(name).await?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.root).await?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(StorageError::Config(format!(
                "storage root is not a directory: {}",
                self.root.display()
            )))
        }
    }
}
