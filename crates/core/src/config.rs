//! Configuration types shared across crates.

use crate::principal::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Records and files held in memory.
    Memory,
    /// Records held in memory, files persisted under `path`.
    Filesystem {
        /// Base directory for saved files.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("storage.path must not be empty for filesystem storage".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// A configured principal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserConfig {
    pub name: String,
    /// Pre-computed hash of the bearer token (SHA256 hex, 64 characters).
    /// Generate with: `echo -n "your-secret-token" | sha256sum`
    pub token_hash: String,
    /// Role names, e.g. `read` or `agents-read-ALL`.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Principal directory.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), String> {
        let mut names = HashSet::new();
        let mut hashes = HashSet::new();
        for user in &self.users {
            if user.name.trim().is_empty() {
                return Err("auth.users: user name must not be empty".to_string());
            }
            if !names.insert(user.name.as_str()) {
                return Err(format!("auth.users: duplicate user '{}'", user.name));
            }
            if user.token_hash.len() != 64 || !user.token_hash.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(format!(
                    "auth.users[{}].token_hash must be 64 hex characters (SHA256)",
                    user.name
                ));
            }
            if !hashes.insert(user.token_hash.to_ascii_lowercase()) {
                return Err(format!(
                    "auth.users[{}].token_hash is shared with another user",
                    user.name
                ));
            }
            for role in &user.roles {
                Role::parse(role)
                    .map_err(|e| format!("auth.users[{}]: {e}", user.name))?;
            }
        }
        Ok(())
    }
}

/// A trusted descriptor and where its filter metadata comes from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrustedDescriptorConfig {
    pub text: String,
    /// Parameter position naming the agent the statement targets.
    #[serde(default)]
    pub agent_id_param: Option<usize>,
    /// Parameter position naming the VM the statement targets.
    #[serde(default)]
    pub vm_id_param: Option<usize>,
}

/// Trusted category names and descriptor texts, fixed at startup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrustConfig {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub descriptors: Vec<TrustedDescriptorConfig>,
}

impl TrustConfig {
    pub fn validate(&self) -> Result<(), String> {
        let mut texts = HashSet::new();
        for descriptor in &self.descriptors {
            if descriptor.text.trim().is_empty() {
                return Err("trust.descriptors: descriptor text must not be empty".to_string());
            }
            if !texts.insert(descriptor.text.as_str()) {
                return Err(format!(
                    "trust.descriptors: duplicate descriptor '{}'",
                    descriptor.text
                ));
            }
        }
        if self.categories.iter().any(|c| c.trim().is_empty()) {
            return Err("trust.categories: category name must not be empty".to_string());
        }
        Ok(())
    }
}

/// Delegation token settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Lifetime of an issued token in seconds (default: 30).
    #[serde(default = "default_token_timeout_secs")]
    pub timeout_secs: u64,
    /// Interval in seconds between sweeps of expired tokens (default: 60).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_token_timeout_secs() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_token_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl TokenConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("tokens.timeout_secs cannot be 0".to_string());
        }
        // tokio::time::interval panics on a zero period
        if self.sweep_interval_secs == 0 {
            return Err("tokens.sweep_interval_secs cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
}

impl AppConfig {
    /// Validate every section, failing on the first problem.
    pub fn validate(&self) -> crate::Result<()> {
        self.storage.validate().map_err(crate::Error::Config)?;
        self.auth.validate().map_err(crate::Error::Config)?;
        self.trust.validate().map_err(crate::Error::Config)?;
        self.tokens.validate().map_err(crate::Error::Config)?;
        Ok(())
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses in-memory storage and no principals.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
                metrics_enabled: true,
            },
            ..Self::default()
        }
    }
}
