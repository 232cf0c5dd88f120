use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aggregator_config::ConfigLoader;
use aggregator_types::BuyRequest;

mod factories;

#[derive(Parser)]
#[command(name = "nft-aggregator")]
#[command(about = "NFT marketplace aggregation planner", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "AGGREGATOR_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Compile an execution plan for a buy request
	Plan {
		/// JSON file holding the buy request
		#[arg(value_name = "REQUEST")]
		request: PathBuf,

		/// Pretty-print the response
		#[arg(long)]
		pretty: bool,
	},
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match &cli.command {
		Commands::Plan { request, pretty } => plan(&cli.config, request, *pretty).await,
		Commands::Validate => validate(&cli.config),
	}
}

async fn plan(config_path: &Path, request_path: &Path, pretty: bool) -> Result<()> {
	let config = ConfigLoader::from_env_and_file(Some(config_path))
		.context("Failed to load configuration")?;

	let contents = std::fs::read_to_string(request_path)
		.with_context(|| format!("Failed to read request file: {:?}", request_path))?;
	let request: BuyRequest =
		serde_json::from_str(&contents).context("Failed to parse buy request")?;

	let aggregator =
		factories::build_aggregator(&config).context("Failed to assemble components")?;
	let response = aggregator.execute_buy(&request).await?;

	// The plan goes to stdout, logs stay on stderr.
	let rendered = if pretty {
		serde_json::to_string_pretty(&response)?
	} else {
		serde_json::to_string(&response)?
	};
	println!("{rendered}");
	Ok(())
}

fn validate(config_path: &Path) -> Result<()> {
	info!("Validating configuration file: {:?}", config_path);

	let config = ConfigLoader::from_env_and_file(Some(config_path))
		.context("Failed to load configuration")?;

	info!("Configuration is valid");
	info!("Chain id: {}", config.chain.chain_id);
	info!("Fill modules: {}", config.addresses.modules.len());
	info!("Direct exchanges: {}", config.addresses.exchanges.len());
	info!("Components:");
	info!("  store: {}", config.components.store.driver);
	info!("  pricing: {}", config.components.pricing.driver);
	info!("  chain: {}", config.components.chain.driver);
	info!("  swap: {}", config.components.swap.driver);
	info!("  calldata: {}", config.components.calldata.driver);
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	Ok(())
}
