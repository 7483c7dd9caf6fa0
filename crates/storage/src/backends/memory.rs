//! In-memory reference backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{FileStore, Storage};
use async_trait::async_trait;
use bytes::Bytes;
use gatehouse_core::{AGENT_ID_KEY, Category, Query, Record, WriteStatement};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Saved files held in memory.
#[derive(Default)]
pub struct MemoryFiles {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for MemoryFiles {
    async fn put(&self, name: &str, data: Bytes) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidKey("empty file name".to_string()));
        }
        self.files.write().await.insert(name.to_string(), data);
        Ok(())
    }

    async fn get(&self, name: &str) -> StorageResult<Option<Bytes>> {
        Ok(self.files.read().await.get(name).cloned())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct Table {
    category: Category,
    records: Vec<Record>,
}

/// Records kept per category in memory, files delegated to a [`FileStore`].
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
    files: Arc<dyn FileStore>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Backend with in-memory files.
    pub fn new() -> Self {
        Self::with_files(Arc::new(MemoryFiles::new()))
    }

    pub fn with_files(files: Arc<dyn FileStore>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            files,
        }
    }
}

fn belongs_to(record: &Record, agent_id: &str) -> bool {
    matches!(record.get(AGENT_ID_KEY), Some(Value::String(id)) if id == agent_id)
}

#[async_trait]
impl Storage for MemoryBackend {
    #[instrument(skip(self, category), fields(backend = "memory", category = %category.name))]
    async fn register_category(&self, category: &Category) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        match tables.get(&category.name) {
            Some(table) if table.category.keys != category.keys => {
                Err(StorageError::SchemaConflict(category.name.clone()))
            }
            Some(_) => Ok(()),
            None => {
                tables.insert(
                    category.name.clone(),
                    Table {
                        category: category.clone(),
                        records: Vec::new(),
                    },
                );
                debug!("category table created");
                Ok(())
            }
        }
    }

    #[instrument(skip(self, query), fields(backend = "memory", category = %query.category.name))]
    async fn query(&self, query: &Query) -> StorageResult<Vec<Record>> {
        let tables = self.tables.read().await;
        let table = tables
            .get(&query.category.name)
            .ok_or_else(|| StorageError::UnknownCategory(query.category.name.clone()))?;

        let matching = table
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        Ok(query.finish(matching))
    }

    #[instrument(skip(self, query), fields(backend = "memory", category = %query.category.name))]
    async fn count(&self, query: &Query) -> StorageResult<u64> {
        let tables = self.tables.read().await;
        let table = tables
            .get(&query.category.name)
            .ok_or_else(|| StorageError::UnknownCategory(query.category.name.clone()))?;

        Ok(table.records.iter().filter(|r| query.matches(r)).count() as u64)
    }

    #[instrument(skip(self, statement), fields(backend = "memory", category = %statement.category().name))]
    async fn execute(&self, statement: &WriteStatement) -> StorageResult<u64> {
        let name = &statement.category().name;
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownCategory(name.clone()))?;

        let affected = match statement {
            WriteStatement::Add { record, .. } => {
                table.records.push(record.clone());
                1
            }
            WriteStatement::Replace { record, .. } => {
                let before = table.records.len();
                table.records.retain(|r| !statement.targets(r));
                let replaced = before - table.records.len();
                table.records.push(record.clone());
                replaced.max(1) as u64
            }
            WriteStatement::Update { updates, .. } => {
                let mut matched = 0;
                for record in table.records.iter_mut() {
                    if !statement.targets(record) {
                        continue;
                    }
                    for (key, value) in updates {
                        record.insert(key.clone(), value.clone());
                    }
                    matched += 1;
                }
                matched
            }
            WriteStatement::Remove { .. } => {
                let before = table.records.len();
                table.records.retain(|r| !statement.targets(r));
                (before - table.records.len()) as u64
            }
        };
        Ok(affected)
    }

    async fn save_file(&self, name: &str, data: Bytes) -> StorageResult<()> {
        self.files.put(name, data).await
    }

    async fn load_file(&self, name: &str) -> StorageResult<Option<Bytes>> {
        self.files.get(name).await
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn purge(&self, agent_id: &str) -> StorageResult<u64> {
        let mut tables = self.tables.write().await;
        let mut removed = 0;
        for table in tables.values_mut() {
            let before = table.records.len();
            table.records.retain(|r| !belongs_to(r, agent_id));
            removed += (before - table.records.len()) as u64;
        }
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.files.health_check().await
    }
}
