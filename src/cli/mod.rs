pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use a specific configuration file instead of the default
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a site starting from the given URL
    Crawl {
        /// Root URL to start from
        #[arg(required = true)]
        url: String,

        /// Caller token authorizing the crawl
        #[arg(short, long)]
        token: String,

        /// Override the configured link depth
        #[arg(short, long)]
        depth: Option<u32>,

        /// Override the configured page limit
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Manage configuration
    Config {
        /// Write the default configuration file and exit
        #[arg(short, long)]
        init: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_default()?,
    };

    match cli.command {
        Commands::Crawl {
            url,
            token,
            depth,
            limit,
        } => {
            info!("Starting crawl on {}", url);
            commands::crawl(config, url, token, depth, limit).await
        }
        Commands::Config { init } => {
            if init {
                info!("Writing default configuration");
                commands::init_config()
            } else {
                commands::show_config(config)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }
}
