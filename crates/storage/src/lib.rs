//! Storage abstraction and reference backends for Gatehouse.
//!
//! This crate provides:
//! - The [`Storage`] capability the gateway executes statements against
//! - A [`FileStore`] abstraction for saved files
//! - An in-memory record backend with in-memory or on-disk files

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{
    filesystem::FilesystemFiles,
    memory::{MemoryBackend, MemoryFiles},
};
pub use error::{StorageError, StorageResult};
pub use traits::{FileStore, Storage};

use gatehouse_core::config::StorageConfig;
use std::sync::Arc;

/// Create a storage backend from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Memory => Ok(Arc::new(MemoryBackend::new())),
        StorageConfig::Filesystem { path } => {
            let files = FilesystemFiles::new(path).await?;
            Ok(Arc::new(MemoryBackend::with_files(Arc::new(files))))
        }
    }
}
