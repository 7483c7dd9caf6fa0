//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use gatehouse_core::{Category, Query, Record, WriteStatement};

/// The backing-store capability the gateway executes statements against.
///
/// The gateway never retries calls into this trait; in particular a failed
/// [`Storage::execute`] is surfaced to the client as is.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Make a plain category known to the store.
    ///
    /// Registering the same schema again is a no-op.
    async fn register_category(&self, category: &Category) -> StorageResult<()>;

    /// Records matching the query, sorted and limited as it specifies.
    async fn query(&self, query: &Query) -> StorageResult<Vec<Record>>;

    /// Number of records matching the query; sort and limit are ignored.
    async fn count(&self, query: &Query) -> StorageResult<u64>;

    /// Apply a data-modifying statement, returning the number of records
    /// affected.
    async fn execute(&self, statement: &WriteStatement) -> StorageResult<u64>;

    async fn save_file(&self, name: &str, data: Bytes) -> StorageResult<()>;

    /// Load a saved file, `None` when no file of that name exists.
    async fn load_file(&self, name: &str) -> StorageResult<Option<Bytes>>;

    /// Remove every record belonging to an agent, returning how many were
    /// removed.
    async fn purge(&self, agent_id: &str) -> StorageResult<u64>;

    /// Short identifier used in logs and metrics.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// don't require connectivity verification.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Named binary blobs (the save-file / load-file surface).
#[async_trait]
pub trait FileStore: Send + Sync + 'static {
    async fn put(&self, name: &str, data: Bytes) -> StorageResult<()>;

    async fn get(&self, name: &str) -> StorageResult<Option<Bytes>>;

    fn backend_name(&self) -> &'static str;

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
