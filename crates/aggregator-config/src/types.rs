//! Configuration types.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use aggregator_types::{Currency, NATIVE_CURRENCY};

/// Top-level aggregator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
	/// Chain being aggregated.
	#[serde(default)]
	pub chain: ChainSettings,
	/// Deployed contract addresses.
	#[serde(default)]
	pub addresses: AddressBook,
	/// Global fee distribution settings.
	#[serde(default)]
	pub fees: FeeSettings,
	/// Path building and planning knobs.
	#[serde(default)]
	pub fill: FillSettings,
	/// Known payment currencies.
	#[serde(default = "default_currencies")]
	pub currencies: Vec<Currency>,
	/// Pluggable collaborator components.
	#[serde(default)]
	pub components: ComponentsConfig,
}

impl Default for AggregatorConfig {
	fn default() -> Self {
		AggregatorConfig {
			chain: ChainSettings::default(),
			addresses: AddressBook::default(),
			fees: FeeSettings::default(),
			fill: FillSettings::default(),
			currencies: default_currencies(),
			components: ComponentsConfig::default(),
		}
	}
}

/// Chain identity and connectivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
	/// EVM chain id.
	pub chain_id: u64,
	/// JSON-RPC endpoint, used by the rpc chain reader.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rpc_url: Option<String>,
}

impl Default for ChainSettings {
	fn default() -> Self {
		ChainSettings {
			chain_id: 1,
			rpc_url: None,
		}
	}
}

/// Deployed contract addresses the planner emits calls against.
///
/// The default book is populated with deterministic placeholder addresses so
/// local planning and tests work without a deployment file; any real
/// deployment overrides all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressBook {
	/// The multicall router contract.
	pub router: Address,
	/// Proxy pulling ERC-20 funds from the taker before routing.
	pub approval_proxy: Address,
	/// Module performing currency swaps ahead of fills.
	pub swap_module: Address,
	/// Wrapped form of the native currency.
	pub wrapped_native: Address,
	/// Protocol fill modules, keyed by module name.
	#[serde(default)]
	pub modules: BTreeMap<String, Address>,
	/// Marketplace exchange contracts for direct and dedicated fills,
	/// keyed by protocol name.
	#[serde(default)]
	pub exchanges: BTreeMap<String, Address>,
}

impl AddressBook {
	/// Looks up a fill module by name.
	pub fn module(&self, name: &str) -> Option<Address> {
		self.modules.get(name).copied()
	}

	/// Looks up an exchange contract by protocol name.
	pub fn exchange(&self, name: &str) -> Option<Address> {
		self.exchanges.get(name).copied()
	}
}

impl Default for AddressBook {
	fn default() -> Self {
		let modules = [
			"seaport",
			"seaport-v1.4",
			"seaport-v1.5",
			"seaport-v1.6",
			"alienswap",
			"looks-rare-v2",
			"zeroex-v4",
			"element",
			"sudoswap",
			"sudoswap-v2",
			"nftx",
			"nftx-v3",
			"rarible",
			"cryptopunks",
			"zora-v3",
			"payment-processor",
		]
		.iter()
		.enumerate()
		.map(|(i, name)| (name.to_string(), Address::repeat_byte(0xb0 + i as u8)))
		.collect();

		let exchanges = [
			"seaport",
			"seaport-v1.4",
			"seaport-v1.5",
			"seaport-v1.6",
			"alienswap",
			"foundation",
			"super-rare",
			"manifold",
			"payment-processor",
		]
		.iter()
		.enumerate()
		.map(|(i, name)| (name.to_string(), Address::repeat_byte(0xc0 + i as u8)))
		.collect();

		AddressBook {
			router: Address::repeat_byte(0xa1),
			approval_proxy: Address::repeat_byte(0xa2),
			swap_module: Address::repeat_byte(0xa3),
			wrapped_native: Address::repeat_byte(0xee),
			modules,
			exchanges,
		}
	}
}

/// Which marketplaces are excluded from hosting global fees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSettings {
	/// Sources never charged global fees.
	pub excluded_sources: Vec<String>,
	/// Sources never charged global fees when the path contains any order
	/// from the first entry of `excluded_sources`.
	pub excluded_sources_expanded: Vec<String>,
}

impl Default for FeeSettings {
	fn default() -> Self {
		FeeSettings {
			excluded_sources: vec!["blur.io".to_string()],
			excluded_sources_expanded: vec!["blur.io".to_string(), "opensea.io".to_string()],
		}
	}
}

/// Tunables for path building and plan compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillSettings {
	/// Wall-clock budget for one buy request, in seconds.
	pub request_timeout_secs: u64,
	/// Maximum candidate orders considered per token.
	pub max_candidates_per_token: usize,
	/// Validity window for generated permits, in seconds.
	pub permit_deadline_secs: u64,
}

impl Default for FillSettings {
	fn default() -> Self {
		FillSettings {
			request_timeout_secs: 40,
			max_candidates_per_token: 50,
			permit_deadline_secs: 1800,
		}
	}
}

/// One pluggable component: which driver to instantiate plus its own config
/// table, passed through opaquely to the driver factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
	/// Driver name, e.g. "memory" or "rpc".
	pub driver: String,
	/// Driver-specific settings.
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

impl ComponentConfig {
	fn new(driver: &str) -> Self {
		ComponentConfig {
			driver: driver.to_string(),
			config: empty_table(),
		}
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}

/// Driver selection for every collaborator seam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentsConfig {
	/// Order store backing path building.
	#[serde(default = "default_store")]
	pub store: ComponentConfig,
	/// Currency conversion oracle.
	#[serde(default = "default_pricing")]
	pub pricing: ComponentConfig,
	/// On-chain state reader.
	#[serde(default = "default_chain")]
	pub chain: ComponentConfig,
	/// Swap route quoter.
	#[serde(default = "default_swap")]
	pub swap: ComponentConfig,
	/// Fetcher for protocols whose calldata comes from an external service.
	#[serde(default = "default_calldata")]
	pub calldata: ComponentConfig,
}

fn default_store() -> ComponentConfig {
	ComponentConfig::new("memory")
}

fn default_pricing() -> ComponentConfig {
	ComponentConfig::new("static")
}

fn default_chain() -> ComponentConfig {
	ComponentConfig::new("static")
}

fn default_swap() -> ComponentConfig {
	ComponentConfig::new("fixed")
}

fn default_calldata() -> ComponentConfig {
	ComponentConfig::new("http")
}

impl Default for ComponentsConfig {
	fn default() -> Self {
		ComponentsConfig {
			store: default_store(),
			pricing: default_pricing(),
			chain: default_chain(),
			swap: default_swap(),
			calldata: default_calldata(),
		}
	}
}

fn default_currencies() -> Vec<Currency> {
	vec![
		Currency {
			contract: NATIVE_CURRENCY,
			symbol: "ETH".to_string(),
			decimals: 18,
		},
		Currency {
			contract: AddressBook::default().wrapped_native,
			symbol: "WETH".to_string(),
			decimals: 18,
		},
	]
}
