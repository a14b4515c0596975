//! devops-mcp - MCP tool servers for Azure DevOps and local DevOps tools.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use devops_azure::{AzureDevOpsClient, AzureResources};
use devops_core::config::{Config, LocalConfig, ENV_PAT};
use devops_core::{Dispatcher, ToolRegistry};
use devops_local::{CommandRunner, LocalTools, TokioCommandRunner};
use devops_mcp::McpServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AZURE_SERVER_NAME: &str = "azure-devops-mcp";
const LOCAL_SERVER_NAME: &str = "local-devops-mcp";

#[derive(Parser)]
#[command(name = "devops-mcp")]
#[command(author, version, about = "MCP tool servers for DevOps automation", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the Azure DevOps tools and resources
    Azure {
        /// Serve HTTP on this address instead of stdio
        #[arg(long, value_name = "ADDR")]
        http: Option<SocketAddr>,
    },

    /// Serve the local docker/git/shell tools
    Local {
        /// Serve HTTP on this address instead of stdio
        #[arg(long, value_name = "ADDR")]
        http: Option<SocketAddr>,
    },

    /// Print a tool catalog as JSON
    Tools {
        #[arg(value_enum)]
        server: ServerKind,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ServerKind {
    Azure,
    Local,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Get a value (e.g. `azure_devops.project`)
    Get { key: String },
    /// Set a value (e.g. `azure_devops.org_url https://dev.azure.com/org`)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Azure { http } => {
            let config = Config::load().context("Failed to load configuration")?;
            let server = azure_server(&config)?;
            serve(server, http).await
        }
        Commands::Local { http } => {
            let config = Config::load().context("Failed to load configuration")?;
            let server = local_server(config.local_settings()).await?;
            serve(server, http).await
        }
        Commands::Tools { server } => {
            let descriptors = match server {
                ServerKind::Azure => devops_azure::tool_descriptors(),
                ServerKind::Local => {
                    let config = Config::load().context("Failed to load configuration")?;
                    devops_local::tool_descriptors(&config.local_settings())
                }
            };
            println!("{}", serde_json::to_string_pretty(&descriptors)?);
            Ok(())
        }
        Commands::Config { command } => handle_config(command),
    }
}

/// Logs go to stderr; stdout belongs to the protocol.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn azure_server(config: &Config) -> anyhow::Result<Arc<McpServer>> {
    let settings = config
        .azure_settings()
        .context("Azure DevOps is not configured")?;
    let client = Arc::new(
        AzureDevOpsClient::new(&settings).context("Failed to create Azure DevOps client")?,
    );

    let registry = devops_azure::register_tools(ToolRegistry::builder(), client.clone())
        .build()
        .context("Failed to build Azure DevOps tool registry")?;

    info!(
        org_url = %settings.org_url,
        project = ?settings.project,
        tools = registry.len(),
        "Azure DevOps server ready"
    );

    Ok(Arc::new(
        McpServer::new(AZURE_SERVER_NAME, Dispatcher::new(registry))
            .with_resources(Arc::new(AzureResources::new(client))),
    ))
}

async fn local_server(settings: LocalConfig) -> anyhow::Result<Arc<McpServer>> {
    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
    let capabilities = devops_local::probe(
        runner.clone(),
        Duration::from_secs(settings.probe_timeout_secs),
    )
    .await;

    let tools = Arc::new(LocalTools::new(runner, settings));
    let registry = devops_local::register_tools(ToolRegistry::builder(), tools, &capabilities)
        .build()
        .context("Failed to build local tool registry")?;

    info!(tools = registry.len(), "Local DevOps server ready");

    Ok(Arc::new(McpServer::new(
        LOCAL_SERVER_NAME,
        Dispatcher::new(registry),
    )))
}

async fn serve(server: Arc<McpServer>, http: Option<SocketAddr>) -> anyhow::Result<()> {
    match http {
        Some(addr) => devops_mcp::http::serve(server, addr)
            .await
            .with_context(|| format!("HTTP server on {} failed", addr)),
        None => server.run_stdio().await.context("stdio transport failed"),
    }
}

fn handle_config(command: ConfigCommands) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = Config::load().context("Failed to load configuration")?;
            let rendered = toml::to_string_pretty(&config)?;
            if rendered.trim().is_empty() {
                println!("No configuration set.");
            } else {
                println!("{}", rendered.trim_end());
            }
            let pat = if std::env::var(ENV_PAT).is_ok_and(|v| !v.trim().is_empty()) {
                "set"
            } else {
                "not set"
            };
            println!("\n{}: {}", ENV_PAT, pat);
        }
        ConfigCommands::Path => {
            println!("{}", Config::config_path()?.display());
        }
        ConfigCommands::Get { key } => {
            let config = Config::load().context("Failed to load configuration")?;
            match config.get(&key)? {
                Some(value) => println!("{}", value),
                None => println!("(not set)"),
            }
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load().context("Failed to load configuration")?;
            config.set(&key, &value)?;
            config.save().context("Failed to save configuration")?;
            println!("Set {} = {}", key, value);
        }
    }
    Ok(())
}
