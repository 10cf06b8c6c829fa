// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Oracle Orchestrator CLI
//!
//! The `oracle` binary runs the analysis server and offers one-shot
//! commands against the same configuration.
//!
//! ## Commands
//!
//! - `oracle serve` - Run the HTTP API with background health probing
//! - `oracle analyze <SIGNAL>` - Run one analysis through the failover chain
//! - `oracle probe` - Probe every backend once and print the failover order
//! - `oracle config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use oracle_core::domain::config::OracleConfigManifest;
use oracle_orchestrator::commands::{self, AnalyzeArgs, ConfigCommand};
use oracle_orchestrator::server::{start_server, ServeOptions};
use oracle_orchestrator::services::Services;

/// Oracle Orchestrator - multi-provider analysis with failover
#[derive(Parser)]
#[command(name = "oracle")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "ORACLE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "ORACLE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format (text, json)
    #[arg(long, global = true, env = "ORACLE_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analysis HTTP server
    #[command(name = "serve")]
    Serve {
        /// HTTP API host (default: spec.network.bind_address)
        #[arg(long, env = "ORACLE_HOST")]
        host: Option<String>,

        /// HTTP API port (default: spec.network.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Analyze a signal once and print the result
    #[command(name = "analyze")]
    Analyze(AnalyzeArgs),

    /// Probe backend availability
    #[command(name = "probe")]
    Probe {
        /// Print the status report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            info!("Starting oracle orchestrator v{}", env!("CARGO_PKG_VERSION"));
            let services = Services::load(cli.config).await?;
            start_server(services, ServeOptions { host, port }).await
        }
        Some(Commands::Analyze(args)) => commands::analyze::execute(args, cli.config).await,
        Some(Commands::Probe { json }) => commands::probe::execute(cli.config, json).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging.
///
/// `RUST_LOG` wins over `--log-level`, which wins over
/// `spec.observability.logging`.
fn init_logging(cli: &Cli) -> Result<()> {
    let configured = OracleConfigManifest::load_or_default(cli.config.clone())
        .ok()
        .and_then(|c| c.spec.observability)
        .and_then(|o| o.logging);

    let level = cli
        .log_level
        .clone()
        .or_else(|| configured.as_ref().map(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let format = cli
        .log_format
        .clone()
        .or_else(|| configured.map(|l| l.format))
        .unwrap_or_else(|| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
