//! Configuration for the comment feed sync engine.
//!
//! Persisted as `commentsync.toml`. Every field has a serde default so a
//! missing file or a partial file both produce a usable config; environment
//! overrides are applied after parsing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "commentsync.toml";

/// Overrides `server.url` when set.
pub const ENV_SERVER_URL: &str = "COMMENTSYNC_SERVER_URL";
/// Overrides `server.ws_url` when set.
pub const ENV_WS_URL: &str = "COMMENTSYNC_WS_URL";

/// Path the realtime endpoint lives at when `ws_url` is derived.
pub const DEFAULT_WS_PATH: &str = "/ws/comments/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub realtime: RealtimeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL of the REST API, e.g. `http://localhost:8000/api`.
    #[serde(default = "default_server_url")]
    pub url: String,
    /// Realtime endpoint. Empty means derive from `url`.
    #[serde(default)]
    pub ws_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// CSRF token obtained by the session bootstrap, attached to writes.
    #[serde(default)]
    pub csrf_token: String,
    /// Bearer token attached to writes.
    #[serde(default)]
    pub auth_token: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            ws_url: String::new(),
            timeout_secs: default_timeout_secs(),
            csrf_token: String::new(),
            auth_token: String::new(),
        }
    }
}

impl ServerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Ordering key forwarded to the server, e.g. `-created_at`.
    #[serde(default = "default_ordering")]
    pub ordering: String,
    #[serde(default)]
    pub page_mode: PageMode,
    /// Author shown when a comment carries no author data.
    #[serde(default = "default_anonymous_name")]
    pub anonymous_name: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            ordering: default_ordering(),
            page_mode: PageMode::Replace,
            anonymous_name: default_anonymous_name(),
        }
    }
}

/// How a loaded page combines with the roots already shown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PageMode {
    /// Each page load becomes the whole root collection.
    #[default]
    Replace,
    /// Page loads append roots not yet present. Memory grows with every page
    /// visited until the next replace.
    Accumulate,
    /// Unknown values are normalized by compatibility fallbacks.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay before reconnecting after the channel closes.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt. `1.0`
    /// keeps the delay fixed.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound for the grown delay.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_delay_ms: default_retry_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

impl RealtimeSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_server_url() -> String {
    "http://localhost:8000/api".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_ordering() -> String {
    "-created_at".to_string()
}
fn default_anonymous_name() -> String {
    "Анонім".to_string()
}
fn default_retry_delay_ms() -> u64 {
    5_000
}
fn default_backoff_factor() -> f64 {
    1.0
}
fn default_max_retry_delay_ms() -> u64 {
    60_000
}

// ── Loading ─────────────────────────────────────────────────────────────

/// `$HOME/.config/commentsync`
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".config").join("commentsync"))
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load config from `path`. A missing file yields defaults. Environment
/// overrides and compatibility fallbacks are applied either way.
pub fn load_from(path: &Path) -> Result<SyncConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        SyncConfig::default()
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    apply_compat_fallbacks(&mut config);
    Ok(config)
}

pub fn apply_env_overrides(config: &mut SyncConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_SERVER_URL).filter(|v| !v.trim().is_empty()) {
        config.server.url = url;
    }
    if let Some(url) = lookup(ENV_WS_URL).filter(|v| !v.trim().is_empty()) {
        config.server.ws_url = url;
    }
}

/// Normalize values the current code cannot use as-is.
/// Returns true when any field was updated.
pub fn apply_compat_fallbacks(config: &mut SyncConfig) -> bool {
    let mut changed = false;

    if config.feed.page_mode == PageMode::Unknown {
        config.feed.page_mode = PageMode::Replace;
        changed = true;
    }

    let trimmed = config.server.url.trim_end_matches('/');
    if trimmed.len() != config.server.url.len() {
        config.server.url = trimmed.to_string();
        changed = true;
    }

    if config.server.ws_url.trim().is_empty() {
        config.server.ws_url = derive_ws_url(&config.server.url);
        changed = true;
    }

    if config.feed.ordering.trim().is_empty() {
        config.feed.ordering = default_ordering();
        changed = true;
    }

    let factor = config.realtime.backoff_factor;
    if !factor.is_finite() || factor < 1.0 {
        config.realtime.backoff_factor = default_backoff_factor();
        changed = true;
    }

    if config.realtime.max_retry_delay_ms < config.realtime.retry_delay_ms {
        config.realtime.max_retry_delay_ms = config.realtime.retry_delay_ms;
        changed = true;
    }

    changed
}

/// `http://host:8000/api` -> `ws://host:8000/ws/comments/`
pub fn derive_ws_url(server_url: &str) -> String {
    let (scheme, rest) = match server_url.split_once("://") {
        Some(("https", rest)) => ("wss", rest),
        Some((_, rest)) => ("ws", rest),
        None => ("ws", server_url),
    };
    let host = rest.split('/').next().unwrap_or(rest);
    format!("{scheme}://{host}{DEFAULT_WS_PATH}")
}
