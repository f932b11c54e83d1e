//! Command line interface

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::App;
use crate::config::AppConfig;

/// sub2api subscription and upstream-account service
#[derive(Parser, Debug)]
#[command(name = "sub2api")]
#[command(about = "Subscription quota and upstream account maintenance")]
#[command(version)]
pub struct Cli {
    /// Read this file instead of the config/ directory and environment
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the token and quota refresh schedulers until Ctrl-C
    Serve,
    /// Print the usage of one account as JSON
    Usage {
        /// Account ID
        account_id: i64,
    },
    /// Run one Antigravity quota refresh cycle and print its summary
    QuotaRefresh,
    /// Validate the configuration and print it
    CheckConfig,
}

/// Run the CLI command
pub async fn run(command: Option<Commands>, config: AppConfig) -> Result<()> {
    match command {
        Some(Commands::CheckConfig) => {
            config.validate()?;
            // Debug output masks client secrets
            println!("{config:#?}");
            println!("configuration OK");
            Ok(())
        }
        Some(Commands::Serve) => {
            config.validate()?;
            App::build(config).await?.serve().await
        }
        Some(Commands::Usage { account_id }) => {
            let app = App::build(config).await?;
            let usage = app.usage.get_usage(account_id).await?;
            println!("{}", serde_json::to_string_pretty(usage.as_ref())?);
            Ok(())
        }
        Some(Commands::QuotaRefresh) => {
            let app = App::build(config).await?;
            let summary = app.quota_refresh.refresh_once().await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            app.save().await
        }
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
