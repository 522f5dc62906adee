// Standalone MCP server binary
//
// Responses go to stdout; logs go to stderr so they never corrupt the protocol stream.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pinner_mcp::config::ServerConfig;
use pinner_mcp::server::McpServer;
use pinner_mcp::tools::{register_docker_tools, register_github_tools, ToolRegistry};
use pinner_sdk::{GithubClient, RegistryClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "pinner-mcp")]
#[command(about = "MCP server that pins GitHub Actions and container images to immutable identifiers")]
#[command(version)]
struct Args {
    /// Path to configuration file (optional)
    #[arg(short, long, env = "PINNER_CONFIG", default_value = "pinner.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, env = "PINNER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    if let Err(e) = run(args).await {
        tracing::error!(error = format!("{:#}", e), "pinner-mcp failed");
        return Err(e);
    }
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pinner_mcp=info,pinner_sdk=info".into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.with_target(false).init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(args: Args) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pinner MCP server starting");

    let mut config = ServerConfig::load(&args.config)?;
    config.apply_overrides(|key| std::env::var(key).ok());

    let github = GithubClient::from_config(config.github_config()?)
        .context("failed to create github client")?;
    tracing::info!(
        api_url = %github.base_url(),
        authenticated = github.is_authenticated(),
        "GitHub client ready"
    );

    let registry_client =
        RegistryClient::new(config.registry_config()).context("failed to create registry client")?;

    let mut registry = ToolRegistry::new();
    register_github_tools(&mut registry, Arc::new(github)).context("failed to register github tools")?;
    register_docker_tools(&mut registry, Arc::new(registry_client))
        .context("failed to register docker tools")?;

    tracing::info!(tools = registry.len(), "Registered tools");

    McpServer::new(registry)
        .serve()
        .await
        .context("MCP transport failed")?;

    Ok(())
}
