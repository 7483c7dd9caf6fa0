use async_trait::async_trait;
use bytes::Bytes;
use gatehouse_core::{Category, Query, Record, WriteStatement};
use gatehouse_storage::{MemoryBackend, Storage, StorageError, StorageResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Duration;

/// Per-method call counters.
#[derive(Default)]
pub struct CallCounts {
    pub register: AtomicUsize,
    pub query: AtomicUsize,
    pub count: AtomicUsize,
    pub execute: AtomicUsize,
    pub purge: AtomicUsize,
}

#[allow(dead_code)]
impl CallCounts {
    /// Calls that read or modify records.
    pub fn data_calls(&self) -> usize {
        self.query.load(Ordering::SeqCst)
            + self.count.load(Ordering::SeqCst)
            + self.execute.load(Ordering::SeqCst)
            + self.purge.load(Ordering::SeqCst)
    }
}

/// Memory backend that records every call and can slow down registration
/// to widen race windows.
#[allow(dead_code)]
pub struct RecordingStorage {
    inner: MemoryBackend,
    pub calls: Arc<CallCounts>,
    register_delay: Duration,
    fail_writes: bool,
}

#[allow(dead_code)]
impl RecordingStorage {
    pub fn new() -> (Arc<Self>, Arc<CallCounts>) {
        Self::build(Duration::ZERO, false)
    }

    pub fn with_register_delay(delay: Duration) -> (Arc<Self>, Arc<CallCounts>) {
        Self::build(delay, false)
    }

    pub fn failing_writes() -> (Arc<Self>, Arc<CallCounts>) {
        Self::build(Duration::ZERO, true)
    }

    fn build(register_delay: Duration, fail_writes: bool) -> (Arc<Self>, Arc<CallCounts>) {
        let calls = Arc::new(CallCounts::default());
        let storage = Arc::new(Self {
            inner: MemoryBackend::new(),
            calls: calls.clone(),
            register_delay,
            fail_writes,
        });
        (storage, calls)
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn register_category(&self, category: &Category) -> StorageResult<()> {
        self.calls.register.fetch_add(1, Ordering::SeqCst);
        if !self.register_delay.is_zero() {
            tokio::time::sleep(self.register_delay).await;
        }
        self.inner.register_category(category).await
    }

    async fn query(&self, query: &Query) -> StorageResult<Vec<Record>> {
        self.calls.query.fetch_add(1, Ordering::SeqCst);
        self.inner.query(query).await
    }

    async fn count(&self, query: &Query) -> StorageResult<u64> {
        self.calls.count.fetch_add(1, Ordering::SeqCst);
        self.inner.count(query).await
    }

    async fn execute(&self, statement: &WriteStatement) -> StorageResult<u64> {
        self.calls.execute.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StorageError::Backend("writes disabled".to_string()));
        }
        self.inner.execute(statement).await
    }

    async fn save_file(&self, name: &str, data: Bytes) -> StorageResult<()> {
        self.inner.save_file(name, data).await
    }

    async fn load_file(&self, name: &str) -> StorageResult<Option<Bytes>> {
        self.inner.load_file(name).await
    }

    async fn purge(&self, agent_id: &str) -> StorageResult<u64> {
        self.calls.purge.fetch_add(1, Ordering::SeqCst);
        self.inner.purge(agent_id).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}
