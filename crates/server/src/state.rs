//! Application state shared across handlers.

use crate::auth::PrincipalDirectory;
use crate::error::ApiResult;
use gatehouse_core::config::AppConfig;
use gatehouse_engine::Gateway;
use gatehouse_storage::Storage;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Registries, authorization filter and token manager.
    pub gateway: Arc<Gateway>,
    /// Principals known by bearer token.
    pub principals: Arc<PrincipalDirectory>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: AppConfig, storage: Arc<dyn Storage>) -> ApiResult<Self> {
        config.validate()?;

        let principals = PrincipalDirectory::from_config(&config.auth)?;
        if principals.is_empty() {
            tracing::warn!("No principals configured, every operation will be rejected");
        }

        let gateway = Gateway::new(storage, &config.trust, config.tokens.timeout());
        tracing::info!(
            principals = principals.len(),
            trusted_categories = config.trust.categories.len(),
            trusted_descriptors = config.trust.descriptors.len(),
            "Gateway initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            gateway: Arc::new(gateway),
            principals: Arc::new(principals),
        })
    }

    /// Spawn the periodic sweep of expired delegation tokens.
    /// The caller should keep the handle to prevent early termination.
    pub fn spawn_token_sweeper(&self) -> JoinHandle<()> {
        self.gateway
            .tokens()
            .clone()
            .spawn_sweeper(self.config.tokens.sweep_interval())
    }
}
