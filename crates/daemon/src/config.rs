use anyhow::{Context, Result};
use commentsync_api_client::ApiClient;
use commentsync_runtime_config::{self as runtime_config, SyncConfig};
use std::path::Path;
use tracing::info;

/// Load `commentsync.toml` from the config directory, or defaults when absent.
pub fn load_config() -> Result<SyncConfig> {
    let path = runtime_config::config_path()?;
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<SyncConfig> {
    if path.exists() {
        info!("Using config {}", path.display());
    } else {
        info!("No config at {}; using defaults", path.display());
    }
    runtime_config::load_from(path)
        .with_context(|| format!("Failed to load config at {}", path.display()))
}

/// API client with the configured timeout and tokens.
pub fn build_client(cfg: &SyncConfig) -> Result<ApiClient> {
    let mut client = ApiClient::new(&cfg.server.url, cfg.server.timeout())
        .context("Failed to create API client")?;
    if !cfg.server.auth_token.is_empty() {
        client.set_auth(cfg.server.auth_token.clone());
    }
    if !cfg.server.csrf_token.is_empty() {
        client.set_csrf_token(cfg.server.csrf_token.clone());
    }
    Ok(client)
}
