//! Interactive CLI for the farmer verification contract
//!
//! Usage examples:
//! ```shell
//! # Run against the standalone network with the genesis wallet
//! farmer-cli
//!
//! # Run against testnet, caching wallet state between runs
//! farmer-cli --network testnet --sync-cache ./.sync_cache run
//!
//! # Probe the configured indexer, node and proof server
//! farmer-cli --network testnet health-check
//! ```

use clap::{Parser, Subcommand};
use cli::Shell;
use eyre::Result;
use farmer_client::{check_services, Config, Devnet, NetworkId};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{stdin, stdout, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "farmer-cli")]
#[command(about = "CLI for registering farmers and crops on the farmer verification contract")]
#[command(version)]
struct Cli {
    /// Network to connect to (undeployed or testnet); defaults to FARMER_NETWORK
    #[arg(long)]
    network: Option<NetworkId>,

    /// Directory for the wallet sync cache
    #[arg(long, env = "SYNC_CACHE")]
    sync_cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive session (default)
    Run,
    /// Check that the network services respond
    HealthCheck {
        /// Per-request timeout
        #[arg(long, default_value = "5")]
        timeout_seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| {
            "cli=info,farmer_cli=info,farmer_client=info".to_string()
        }))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env_for_network(cli.network)?;
    if let Some(directory) = cli.sync_cache {
        config.cache.directory = Some(directory);
    }
    config.validate()?;

    info!("Using network: {}", config.network.id);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await?,
        Commands::HealthCheck { timeout_seconds } => {
            health_check(&config, Duration::from_secs(timeout_seconds)).await;
        }
    }

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    if config.cache.directory.is_none() {
        info!("SYNC_CACHE not set, wallet state will not be cached");
    }
    if let Some(notice) = devnet_notice(&config) {
        warn!("{notice}");
    }

    let devnet = Devnet::new(config.devnet.clone());
    let mut shell = Shell::new(config, devnet.backend(), BufReader::new(stdin()), stdout());
    shell.run().await?;
    Ok(())
}

/// Sessions always run on the in-process devnet; say so when another network
/// was selected.
fn devnet_notice(config: &Config) -> Option<String> {
    (!config.is_standalone()).then(|| {
        format!(
            "Interactive session runs against the in-process devnet, not {}",
            config.network.id
        )
    })
}

async fn health_check(config: &Config, timeout: Duration) {
    info!("Checking network services...");

    let results = check_services(&config.network, timeout).await;
    let unhealthy = results.iter().filter(|health| !health.is_healthy()).count();
    if unhealthy == 0 {
        info!("✅ All {} services reachable", results.len());
    } else {
        warn!("⚠️ {unhealthy} of {} services unreachable", results.len());
    }
}
