//! sub2api - subscription quota and upstream account maintenance
//!
//! CLI entry point.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::info;

mod app;
mod cli;
mod config;
mod loader;
mod logging;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => loader::load_config_file(path)?,
        None => loader::load_config()?,
    };

    let _log_guard = logging::init(&config.logging)?;
    if cli.command.is_some() {
        info!("Starting sub2api v{}", env!("CARGO_PKG_VERSION"));
    }

    cli::run(cli.command, config).await
}
