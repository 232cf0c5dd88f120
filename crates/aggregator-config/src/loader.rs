//! Configuration loading from files and environment.

use crate::types::*;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
	/// Load configuration from file
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<AggregatorConfig> {
		let path = path.as_ref();
		info!("Loading configuration from {:?}", path);

		let contents = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {:?}", path))?;

		let config = match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Self::from_toml(&contents)?,
			Some("json") => Self::from_json(&contents)?,
			_ => anyhow::bail!("Unsupported config format: {:?}", path),
		};

		Self::validate_config(&config)?;
		Ok(config)
	}

	/// Load from TOML string
	pub fn from_toml(contents: &str) -> Result<AggregatorConfig> {
		toml::from_str(contents).map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))
	}

	/// Load from JSON string
	pub fn from_json(contents: &str) -> Result<AggregatorConfig> {
		serde_json::from_str(contents).context("Failed to parse JSON")
	}

	/// Load from environment variables with optional file override
	pub fn from_env_and_file(file_path: Option<&Path>) -> Result<AggregatorConfig> {
		let mut config = if let Some(path) = file_path {
			Self::from_file(path)?
		} else {
			AggregatorConfig::default()
		};

		Self::apply_env_overrides(&mut config)?;

		Self::validate_config(&config)?;
		Ok(config)
	}

	/// Apply environment variable overrides
	fn apply_env_overrides(config: &mut AggregatorConfig) -> Result<()> {
		if let Ok(url) = std::env::var("AGGREGATOR_RPC_URL") {
			debug!("Overriding RPC URL from environment");
			config.chain.rpc_url = Some(url);
		}

		if let Ok(chain_id) = std::env::var("AGGREGATOR_CHAIN_ID") {
			debug!("Overriding chain id from environment");
			config.chain.chain_id = chain_id
				.parse()
				.context("AGGREGATOR_CHAIN_ID must be a number")?;
		}

		if let Ok(url) = std::env::var("AGGREGATOR_CALLDATA_URL") {
			debug!("Overriding calldata service URL from environment");
			if let Some(table) = config.components.calldata.config.as_table_mut() {
				table.insert("base_url".to_string(), toml::Value::String(url));
			}
		}

		Ok(())
	}

	/// Validate configuration
	fn validate_config(config: &AggregatorConfig) -> Result<()> {
		if config.addresses.router == Address::ZERO {
			anyhow::bail!("addresses.router must be set");
		}
		if config.addresses.approval_proxy == Address::ZERO {
			anyhow::bail!("addresses.approval_proxy must be set");
		}
		if config.addresses.swap_module == Address::ZERO {
			anyhow::bail!("addresses.swap_module must be set");
		}
		if config.addresses.wrapped_native == Address::ZERO {
			anyhow::bail!("addresses.wrapped_native must be set");
		}

		// The expanded exclusion list replaces the base list wholesale, so
		// every base entry must still be present in it.
		for source in &config.fees.excluded_sources {
			if !config.fees.excluded_sources_expanded.contains(source) {
				anyhow::bail!(
					"fees.excluded_sources_expanded must contain '{}' from fees.excluded_sources",
					source
				);
			}
		}

		let mut seen = std::collections::HashSet::new();
		for currency in &config.currencies {
			if !seen.insert(currency.contract) {
				anyhow::bail!("Duplicate currency entry for {}", currency.contract);
			}
		}

		if config.fill.request_timeout_secs == 0 {
			anyhow::bail!("fill.request_timeout_secs must be positive");
		}
		if config.fill.max_candidates_per_token == 0 {
			anyhow::bail!("fill.max_candidates_per_token must be positive");
		}

		Ok(())
	}
}

/// Load configuration from standard locations
pub fn load_config() -> Result<AggregatorConfig> {
	// Check for config file in order:
	// 1. Environment variable AGGREGATOR_CONFIG
	// 2. ./aggregator.toml
	// 3. Default config with env overrides

	if let Ok(path) = std::env::var("AGGREGATOR_CONFIG") {
		return ConfigLoader::from_env_and_file(Some(Path::new(&path)));
	}

	let default_path = Path::new("./aggregator.toml");
	if default_path.exists() {
		return ConfigLoader::from_env_and_file(Some(default_path));
	}

	ConfigLoader::from_env_and_file(None)
}
