// vulnscan-mcp - Main Entry Point
//
// Loads the immutable configuration from the environment, initializes
// tracing, and serves the MCP endpoint until the process stops.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use vulnscan_mcp::config::Config;
use vulnscan_mcp::server;

/// MCP server for vulnerability scanning, CVE lookup, and a sandboxed
/// command runner
#[derive(Parser, Debug)]
#[command(name = "vulnscan-mcp")]
#[command(version)]
#[command(about = "Security-scanning MCP server (grype, snyk, NVD, lab shell)", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCP server (default)
    Serve,

    /// Print the effective configuration and exit
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(filter.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if !config.auth.enabled() {
                warn!("MCP_AUTH_TOKEN not set. Server is running without authentication.");
            }
            info!(
                "vulnscan-mcp v{} starting on {}",
                env!("CARGO_PKG_VERSION"),
                config.bind_addr()
            );
            server::serve(config).await?;
        }
        Commands::ShowConfig => {
            // The auth token and API keys are secrets; print presence only
            println!("bind          = {}", config.bind_addr());
            println!("auth          = {}", on_off(config.auth.enabled()));
            println!("nvd_api_key   = {}", on_off(config.nvd.api_key.is_some()));
            println!("snyk_token    = {}", on_off(config.scan.snyk_token.is_some()));
            println!("allowed_cmds  = {}", config.exec.allowed_commands);
        }
    }

    Ok(())
}

fn on_off(set: bool) -> &'static str {
    if set {
        "configured"
    } else {
        "not configured"
    }
}
