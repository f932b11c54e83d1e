//! Application configuration types

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use sub2api_core::{TokenRefreshConfig, UsageCacheConfig};
use sub2api_upstream::UpstreamConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub token_refresh: TokenRefreshConfig,
    #[serde(default)]
    pub usage_cache: UsageCacheConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the in-memory store is persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    /// Write the snapshot back on shutdown
    #[serde(default = "default_true")]
    pub save_on_shutdown: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            save_on_shutdown: true,
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("data/store.json")
}

fn default_true() -> bool {
    true
}

/// Output format of the console log layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Also write daily rolling files here
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "sub2api=info,sub2api_core=info,sub2api_upstream=info".to_string()
}

impl AppConfig {
    /// Reject settings the services cannot run with
    pub fn validate(&self) -> Result<()> {
        self.token_refresh.validate()?;
        self.usage_cache.validate()?;

        if self.token_refresh.enabled {
            if self.upstream.google_client_id.trim().is_empty() {
                bail!("upstream.google_client_id is required when token refresh is enabled");
            }
            if self.upstream.anthropic_client_id.trim().is_empty() {
                bail!("upstream.anthropic_client_id is required when token refresh is enabled");
            }
        }
        if self.upstream.timeout_seconds == 0 {
            bail!("upstream.timeout_seconds must be greater than zero");
        }
        Ok(())
    }
}
