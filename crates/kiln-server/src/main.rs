//! Kiln Server
//!
//! Kafka-compatible listener answering ApiVersions, DescribeTopicPartitions
//! and Fetch from a static topic catalogue.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kiln_config::{validate_config, EnvironmentProvider, FileProvider, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod server;

use server::KafkaServer;

#[derive(Parser, Debug)]
#[command(
    name = "kiln-server",
    about = "Kiln - Kafka protocol front end",
    version,
    long_about = "Answers Kafka ApiVersions, DescribeTopicPartitions and Fetch requests from a static topic catalogue"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (.toml, .json, .yaml or .yml)
    #[arg(short = 'c', long, env = "KILN_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (default: 0.0.0.0)
    #[arg(short = 'b', long, env = "KILN_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Port for Kafka protocol (default: 9092)
    #[arg(short = 'p', long, env = "KILN_PORT")]
    port: Option<u16>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version and supported APIs
    #[command(about = "Display version and supported API versions")]
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).context("invalid log level")?)
        .init();

    if let Some(Commands::Version) = cli.command {
        println!("Kiln Server v{}", env!("CARGO_PKG_VERSION"));
        println!("Supported APIs:");
        for (api_key, range) in kiln_protocol::supported_api_versions() {
            println!("  - {:?} ({}): v{}-v{}", api_key, api_key as i16, range.min, range.max);
        }
        return Ok(());
    }

    let config = load_config(&cli).await?;
    let server = KafkaServer::new(&config);
    server.run(&config.listen_addr(), shutdown_signal()).await?;

    info!("Kiln server stopped");
    Ok(())
}

/// Defaults, then the config file, then `KILN_*` variables, then flags
async fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => FileProvider::new(path)?.load().await?,
        None => ServerConfig::default(),
    };

    EnvironmentProvider::default().apply(&mut config)?;

    if let Some(bind_addr) = &cli.bind_addr {
        config.bind_addr = bind_addr.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    validate_config(&config).context("invalid configuration")?;
    Ok(config)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating shutdown"),
        Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
    }
}
