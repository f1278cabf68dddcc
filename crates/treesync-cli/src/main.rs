//! treesync CLI - Command-line tool for live tree database locations
//!
//! Follows a location over the database's event stream and prints every
//! change as it is applied.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use treesync_client::{Location, TreeSyncClient};

use crate::config::{Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "treesync")]
#[command(author, version, about = "Live tree database CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Credential sent with every stream request
    #[arg(short, long, env = "TREESYNC_AUTH", hide_env_values = true)]
    auth: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "TREESYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a location and print every change
    Watch {
        /// Location URL, e.g. https://example.firebaseio.com/rooms
        url: String,

        /// Exit after this many changes
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Print the current value of a location and exit
    Get {
        /// Location URL
        url: String,

        /// Seconds to wait for the value
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG wins over the flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("treesync=debug,treesync_client=debug,treesync_core=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(cli.auth.as_deref(), cli.output, cli.no_color);

    // Create output context
    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);

    // Execute command
    match &cli.command {
        Commands::Watch { url, count } => {
            let client = create_client(&merged)?;
            let location = parse_location(url)?;
            commands::watch(&client, &location, *count, &ctx).await?;
        }

        Commands::Get { url, timeout } => {
            let client = create_client(&merged)?;
            let location = parse_location(url)?;
            commands::get(&client, &location, *timeout, &ctx).await?;
        }
    }

    Ok(())
}

/// Create a treesync client from the merged configuration
fn create_client(merged: &MergedConfig) -> Result<TreeSyncClient> {
    TreeSyncClient::from_config(&merged.client).context("Failed to create treesync client")
}

fn parse_location(url: &str) -> Result<Location> {
    Location::parse(url).with_context(|| format!("Invalid location: {}", url))
}
