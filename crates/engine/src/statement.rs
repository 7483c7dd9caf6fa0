//! Prepared-statement registry: compiles trusted descriptors once and hands
//! out stable ids.

use crate::authz::{DescriptorMetadataFactory, ParamIndexMetadata};
use crate::category::CategoryRegistry;
use crate::error::{EngineError, Result};
use gatehouse_core::config::TrustedDescriptorConfig;
use gatehouse_core::{Category, DataType, StatementTemplate, descriptor};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// A descriptor text prepared against a registered category.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StatementDescriptor {
    pub category_id: u32,
    pub text: String,
}

impl StatementDescriptor {
    pub fn new(category_id: u32, text: impl Into<String>) -> Self {
        Self {
            category_id,
            text: text.into(),
        }
    }
}

/// Descriptor texts that may be compiled, each with its metadata factory.
#[derive(Clone, Default)]
pub struct TrustedDescriptors {
    entries: HashMap<String, Arc<dyn DescriptorMetadataFactory>>,
}

impl TrustedDescriptors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration; every entry uses [`ParamIndexMetadata`].
    pub fn from_config(descriptors: &[TrustedDescriptorConfig]) -> Self {
        let mut trusted = Self::new();
        for entry in descriptors {
            trusted.insert(
                entry.text.clone(),
                Arc::new(ParamIndexMetadata {
                    agent_id_param: entry.agent_id_param,
                    vm_id_param: entry.vm_id_param,
                }),
            );
        }
        trusted
    }

    pub fn insert(&mut self, text: impl Into<String>, factory: Arc<dyn DescriptorMetadataFactory>) {
        self.entries.insert(text.into(), factory);
    }

    pub fn get(&self, text: &str) -> Option<&Arc<dyn DescriptorMetadataFactory>> {
        self.entries.get(text)
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for TrustedDescriptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// A compiled descriptor, cached for the life of the process.
pub struct PreparedStatementHolder {
    pub id: u32,
    pub descriptor: StatementDescriptor,
    pub template: StatementTemplate,
    /// Category the template was compiled against.
    pub category: Arc<Category>,
    pub metadata: Arc<dyn DescriptorMetadataFactory>,
}

impl PreparedStatementHolder {
    pub fn free_param_count(&self) -> usize {
        self.template.free_param_count()
    }

    pub fn data_type(&self) -> &DataType {
        &self.category.data_type
    }
}

impl fmt::Debug for PreparedStatementHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatementHolder")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("free_param_count", &self.free_param_count())
            .finish()
    }
}

/// Outcome of a successful prepare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prepared {
    pub id: u32,
    pub free_param_count: usize,
    /// Whether the descriptor had been compiled before.
    pub cached: bool,
}

#[derive(Default)]
struct Cache {
    by_descriptor: HashMap<StatementDescriptor, u32>,
    by_id: Vec<Arc<PreparedStatementHolder>>,
}

pub struct StatementRegistry {
    categories: Arc<CategoryRegistry>,
    trusted: TrustedDescriptors,
    /// Guards cache check, compilation and id assignment together.
    cache: Mutex<Cache>,
    compiles: AtomicUsize,
}

impl StatementRegistry {
    pub fn new(categories: Arc<CategoryRegistry>, trusted: TrustedDescriptors) -> Self {
        Self {
            categories,
            trusted,
            cache: Mutex::new(Cache::default()),
            compiles: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("statement cache Mutex was poisoned, recovering with into_inner()");
            poisoned.into_inner()
        })
    }

    /// Compile a trusted descriptor, or return the id it was given before.
    pub fn prepare(&self, descriptor: StatementDescriptor) -> Result<Prepared> {
        // Resolved before taking the cache lock; the two are never held together.
        let category = self
            .categories
            .resolve(descriptor.category_id)
            .map_err(|_| EngineError::UnknownCategoryId(descriptor.category_id))?
            .category()
            .clone();

        let Some(metadata) = self.trusted.get(&descriptor.text).cloned() else {
            tracing::warn!(
                category_id = descriptor.category_id,
                descriptor = %descriptor.text,
                "rejected untrusted descriptor"
            );
            return Err(EngineError::UntrustedDescriptor);
        };

        let mut cache = self.lock();
        if let Some(&id) = cache.by_descriptor.get(&descriptor) {
            let free_param_count = cache
                .by_id
                .get(id as usize)
                .map_or(0, |holder| holder.free_param_count());
            debug!(statement_id = id, "prepared statement cache hit");
            return Ok(Prepared {
                id,
                free_param_count,
                cached: true,
            });
        }

        self.compiles.fetch_add(1, Ordering::Relaxed);
        let template = descriptor::compile(&descriptor.text, &category).map_err(|e| {
            tracing::warn!(descriptor = %descriptor.text, error = %e, "descriptor failed to compile");
            EngineError::ParseFailed(e)
        })?;

        let id = cache.by_id.len() as u32;
        let holder = Arc::new(PreparedStatementHolder {
            id,
            descriptor: descriptor.clone(),
            template,
            category,
            metadata,
        });
        let free_param_count = holder.free_param_count();
        cache.by_id.push(holder);
        cache.by_descriptor.insert(descriptor, id);

        info!(statement_id = id, free_param_count, "statement prepared");
        Ok(Prepared {
            id,
            free_param_count,
            cached: false,
        })
    }

    pub fn resolve(&self, id: u32) -> Result<Arc<PreparedStatementHolder>> {
        self.lock()
            .by_id
            .get(id as usize)
            .cloned()
            .ok_or(EngineError::UnknownStatement(id))
    }

    /// Number of descriptor compilations attempted so far.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::Relaxed)
    }

    /// Number of cached statements.
    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
