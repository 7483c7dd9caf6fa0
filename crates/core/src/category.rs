//! Category schemas.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Key naming the agent a record belongs to.
pub const AGENT_ID_KEY: &str = "agentId";

/// Key naming the VM a record belongs to.
pub const VM_ID_KEY: &str = "vmId";

/// A typed, named key of a category.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Key name as it appears in records and descriptors.
    pub name: String,
    /// Whether the key is part of the record's identity.
    #[serde(default)]
    pub indexed: bool,
}

impl Key {
    pub fn new(name: impl Into<String>, indexed: bool) -> Self {
        Self {
            name: name.into(),
            indexed,
        }
    }
}

/// Result/data type tag of a category.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    /// Plain records of the named type.
    Record(String),
    /// Aggregate count results derived from a plain category.
    AggregateCount,
}

impl DataType {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::AggregateCount)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(name) => write!(f, "record:{name}"),
            Self::AggregateCount => f.write_str("aggregate-count"),
        }
    }
}

/// A named, typed schema describing one kind of stored record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    pub keys: Vec<Key>,
    pub data_type: DataType,
}

impl Category {
    /// Create a category, rejecting empty names and duplicate keys.
    pub fn new(
        name: impl Into<String>,
        keys: Vec<Key>,
        data_type: DataType,
    ) -> crate::Result<Self> {
        let category = Self {
            name: name.into(),
            keys,
            data_type,
        };
        category.validate()?;
        Ok(category)
    }

    /// Check schema invariants of a (possibly deserialized) category.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::InvalidCategory(
                "category name must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for key in &self.keys {
            if !seen.insert(key.name.as_str()) {
                return Err(crate::Error::InvalidCategory(format!(
                    "duplicate key '{}' in category '{}'",
                    key.name, self.name
                )));
            }
        }
        Ok(())
    }

    /// Whether the category declares a key with this name.
    pub fn has_key(&self, name: &str) -> bool {
        self.keys.iter().any(|k| k.name == name)
    }

    /// Derive the aggregate-count view of this category.
    ///
    /// The view keeps the name and keys so statements against it can filter
    /// on the original record keys; only the result shape changes.
    pub fn adapt_aggregate(&self) -> Self {
        Self {
            name: self.name.clone(),
            keys: self.keys.clone(),
            data_type: DataType::AggregateCount,
        }
    }
}
