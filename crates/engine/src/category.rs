//! Category registry: small integer ids for registered schemas.

use crate::error::{EngineError, Result};
use gatehouse_core::{Category, DataType};
use gatehouse_storage::Storage;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// A registry entry.
#[derive(Clone, Debug, PartialEq)]
pub enum RegisteredCategory {
    /// Registered with storage.
    Plain(Arc<Category>),
    /// Adapted in memory from the plain category with `original_id`.
    Aggregate {
        original_id: u32,
        category: Arc<Category>,
    },
}

/// Outcome of a successful registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registered {
    pub id: u32,
    /// Whether the `(name, dataType)` pair was already registered.
    pub cached: bool,
}

impl Registered {
    fn new(id: u32) -> Self {
        Self { id, cached: false }
    }

    fn cached(id: u32) -> Self {
        Self { id, cached: true }
    }
}

impl RegisteredCategory {
    pub fn category(&self) -> &Arc<Category> {
        match self {
            Self::Plain(category) | Self::Aggregate { category, .. } => category,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate { .. })
    }
}

#[derive(Default)]
struct Tables {
    by_id: Vec<RegisteredCategory>,
    by_key: HashMap<(String, DataType), u32>,
    plain_by_name: HashMap<String, u32>,
}

impl Tables {
    fn insert(&mut self, key: (String, DataType), entry: RegisteredCategory) -> u32 {
        let id = self.by_id.len() as u32;
        if !entry.is_aggregate() {
            self.plain_by_name.entry(key.0.clone()).or_insert(id);
        }
        self.by_id.push(entry);
        self.by_key.insert(key, id);
        id
    }
}

/// Assigns ids to categories, once each, in registration order.
pub struct CategoryRegistry {
    storage: Arc<dyn Storage>,
    trusted: HashSet<String>,
    /// Serializes check-then-register-then-assign across the storage call.
    registration: Mutex<()>,
    tables: RwLock<Tables>,
}

impl CategoryRegistry {
    pub fn new(storage: Arc<dyn Storage>, trusted: impl IntoIterator<Item = String>) -> Self {
        Self {
            storage,
            trusted: trusted.into_iter().collect(),
            registration: Mutex::new(()),
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|poisoned| {
            tracing::warn!("category tables RwLock was poisoned, recovering with into_inner()");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|poisoned| {
            tracing::warn!("category tables RwLock was poisoned, recovering with into_inner()");
            poisoned.into_inner()
        })
    }

    fn lookup(&self, key: &(String, DataType)) -> Option<u32> {
        self.read().by_key.get(key).copied()
    }

    /// Register a category, returning its id.
    ///
    /// Known `(name, data_type)` pairs return their existing id without
    /// touching storage. Aggregate categories are derived from the plain
    /// category of the same name and never sent to storage.
    pub async fn register(
        &self,
        name: &str,
        data_type: DataType,
        category: Category,
    ) -> Result<Registered> {
        let key = (name.to_string(), data_type);
        if let Some(id) = self.lookup(&key) {
            debug!(category = %name, id, "category already registered");
            return Ok(Registered::cached(id));
        }

        let _guard = self.registration.lock().await;
        if let Some(id) = self.lookup(&key) {
            debug!(category = %name, id, "category already registered");
            return Ok(Registered::cached(id));
        }

        if key.1.is_aggregate() {
            return self.register_aggregate(key);
        }

        if !self.trusted.contains(name) {
            tracing::warn!(category = %name, "rejected registration of untrusted category");
            return Err(EngineError::UnknownCategory(name.to_string()));
        }
        if category.name != name || category.data_type != key.1 {
            return Err(EngineError::InvalidCategory(format!(
                "schema '{}' ({}) does not match registration '{name}' ({})",
                category.name, category.data_type, key.1
            )));
        }
        category
            .validate()
            .map_err(|e| EngineError::InvalidCategory(e.to_string()))?;

        self.storage.register_category(&category).await.map_err(|e| {
            error!(category = %name, error = %e, "storage rejected category registration");
            EngineError::Storage(e)
        })?;

        let id = self
            .write()
            .insert(key, RegisteredCategory::Plain(Arc::new(category)));
        info!(category = %name, id, "category registered");
        Ok(Registered::new(id))
    }

    fn register_aggregate(&self, key: (String, DataType)) -> Result<Registered> {
        let mut tables = self.write();
        let original = tables
            .plain_by_name
            .get(&key.0)
            .and_then(|id| tables.by_id.get(*id as usize).map(|entry| (*id, entry)));

        let Some((original_id, original)) = original else {
            error!(
                category = %key.0,
                "aggregate category requested before its original was registered"
            );
            return Err(EngineError::OriginalCategoryNotRegistered(key.0));
        };

        let adapted = Arc::new(original.category().adapt_aggregate());
        let name = key.0.clone();
        let id = tables.insert(
            key,
            RegisteredCategory::Aggregate {
                original_id,
                category: adapted,
            },
        );
        info!(category = %name, id, original_id, "aggregate category registered");
        Ok(Registered::new(id))
    }

    pub fn resolve(&self, id: u32) -> Result<RegisteredCategory> {
        self.read()
            .by_id
            .get(id as usize)
            .cloned()
            .ok_or(EngineError::CategoryNotFound(id))
    }

    /// Number of registered categories.
    pub fn len(&self) -> usize {
        self.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
