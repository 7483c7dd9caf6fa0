//! Startup: configuration loading and state construction.

use crate::state::AppState;
use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use gatehouse_core::config::AppConfig;
use std::path::Path;

/// Prefix of environment variables overriding configuration.
pub const ENV_PREFIX: &str = "GATEHOUSE_";

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "GATEHOUSE_CONFIG";

/// Load configuration from an optional TOML file overlaid with
/// `GATEHOUSE_`-prefixed environment variables (`__` separates sections).
pub fn load_config(config_path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    let has_config_file = Path::new(config_path).exists();

    if has_config_file {
        tracing::info!(config_path = %config_path, "Loading configuration from file");
        figment = figment.merge(Toml::file(config_path));
    } else {
        tracing::debug!("No config file found at {}", config_path);
    }

    let has_env_config = std::env::vars()
        .any(|(key, _)| key.starts_with(ENV_PREFIX) && key != CONFIG_PATH_ENV);

    if !has_config_file && !has_env_config {
        bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: gatehoused --config /path/to/config.toml\n  \
             2. Environment variables: GATEHOUSE_SERVER__BIND=0.0.0.0:8080 gatehoused\n\n\
             Set GATEHOUSE_CONFIG env var to specify a default config file path."
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    Ok(config)
}

/// Initialize storage, verify it and build the shared state.
pub async fn build_state(config: AppConfig) -> Result<AppState> {
    let storage = gatehouse_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    // Catch misconfigured storage before accepting requests.
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!("Storage backend connectivity verified");

    AppState::new(config, storage).context("failed to build application state")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::config::StorageConfig;

    #[test]
    fn load_config_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "127.0.0.1:9999"

[[auth.users]]
name = "client"
token_hash = "4c5dc9b7708905f77f5e5d16316b5dfb425e68cb326dcd55a860e90a7707031e"
roles = ["read", "agents-read-ALL"]

[trust]
categories = ["host-info"]

[[trust.descriptors]]
text = "QUERY host-info WHERE agentId = ?s"
agent_id_param = 0

[tokens]
timeout_secs = 10
"#,
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9999");
        assert_eq!(config.auth.users.len(), 1);
        assert_eq!(config.trust.descriptors[0].agent_id_param, Some(0));
        assert_eq!(config.tokens.timeout_secs, 10);
        assert_eq!(config.tokens.sweep_interval_secs, 60);
        assert!(matches!(config.storage, StorageConfig::Memory));
    }

    #[test]
    fn load_config_rejects_invalid_roles() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[[auth.users]]
name = "client"
token_hash = "4c5dc9b7708905f77f5e5d16316b5dfb425e68cb326dcd55a860e90a7707031e"
roles = ["superuser"]
"#,
        )
        .unwrap();

        assert!(load_config(path.to_str().unwrap()).is_err());
    }

    #[tokio::test]
    async fn build_state_with_filesystem_storage() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path: temp.path().join("files"),
        };

        let state = build_state(config).await.unwrap();
        assert_eq!(state.gateway.storage().backend_name(), "memory");
    }
}
