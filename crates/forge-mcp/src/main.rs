//! Gitea/Forgejo MCP Server
//!
//! # Usage
//!
//! ```bash
//! forge-mcp --url https://codeberg.org [--token <token>] [--dialect auto] [--compat] [--debug]
//! forge-mcp --config forge-mcp.toml
//! ```
//!
//! Command line flags and their environment variables take precedence over
//! the config file.
//!
//! # Environment Variables
//!
//! - `FORGE_URL`, `FORGE_TOKEN`, `FORGE_DIALECT`, `FORGE_COMPAT`, `FORGE_DEBUG`,
//!   `FORGE_CONFIG`: same as the flags
//! - `RUST_LOG`: Control log verbosity (default: `info` for the forge_mcp, forge_core and forge_git targets)
//!
//! # Protocol
//!
//! The server communicates via JSON-RPC 2.0 over stdio:
//! - Requests/responses go through stdout
//! - Logs go to stderr (to avoid interfering with the protocol)

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clap::builder::BoolishValueParser;
use forge_core::{ConfigLayer, ServerConfig};
use forge_mcp::{ForgeMcpServer, HttpTransport};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

/// MCP server for Gitea and Forgejo
#[derive(Parser)]
#[command(name = "forge-mcp")]
#[command(about = "MCP server for Gitea and Forgejo")]
#[command(version)]
struct Args {
    /// Base URL of the Gitea or Forgejo instance
    #[arg(long, env = "FORGE_URL")]
    url: Option<String>,

    /// API access token
    #[arg(long, env = "FORGE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Backend dialect: gitea, forgejo, or auto
    #[arg(long, env = "FORGE_DIALECT")]
    dialect: Option<String>,

    /// Verbose text output, one line per item
    #[arg(
        long,
        env = "FORGE_COMPAT",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    compat: Option<bool>,

    /// Expose diagnostic tools
    #[arg(
        long,
        env = "FORGE_DEBUG",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    debug: Option<bool>,

    /// TOML config file
    #[arg(short, long, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,
}

impl Args {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            url: self.url.clone(),
            token: self.token.clone(),
            dialect: self.dialect.clone(),
            compat: self.compat,
            debug: self.debug,
        }
    }
}

/// Crates whose `info` and `warn` events are shown without `RUST_LOG`.
const LOG_TARGETS: [&str; 3] = ["forge_mcp", "forge_core", "forge_git"];

fn log_filter() -> Result<EnvFilter, ParseError> {
    LOG_TARGETS
        .iter()
        .try_fold(EnvFilter::from_default_env(), |filter, target| {
            Ok(filter.add_directive(format!("{target}=info").parse()?))
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging to stderr (stdout is reserved for MCP protocol)
    tracing_subscriber::fmt()
        .with_env_filter(log_filter()?)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match &args.config {
        Some(path) => ConfigLayer::load(path)?,
        None => ConfigLayer::default(),
    };
    let config = ServerConfig::from_layer(args.layer().or(file))?;

    tracing::info!(?config, "Starting forge-mcp server");

    let transport = Arc::new(HttpTransport::new(&config)?);
    ForgeMcpServer::new(config, transport).run().await?;

    Ok(())
}
