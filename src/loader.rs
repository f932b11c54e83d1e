//! Configuration loading
//!
//! Embedded defaults, then optional files, then environment.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

use crate::config::AppConfig;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let env_name = std::env::var("SUB2API_ENV").unwrap_or_else(|_| "development".to_string());
    let builder = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{env_name}")).required(false))
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority).
        // SUB2API_TOKEN_REFRESH__ENABLED: single `_` after the prefix, `__` between keys
        .add_source(
            Environment::with_prefix("SUB2API")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
    build(builder)
}

/// Load only an explicit file layered over the embedded defaults
pub fn load_config_file(path: &str) -> Result<AppConfig> {
    let builder = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name(path).required(true));
    build(builder)
}

fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<AppConfig> {
    builder
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
