//! Driver dispatch for the pluggable collaborator seams.
//!
//! Each seam names its driver in `[components.*]` and carries an opaque
//! config table the driver factory interprets on its own.

use anyhow::{bail, Result};
use std::sync::Arc;

use aggregator_chain::implementations::{rpc, static_chain};
use aggregator_chain::ChainReader;
use aggregator_config::AggregatorConfig;
use aggregator_core::Aggregator;
use aggregator_pricing::implementations::static_rates;
use aggregator_pricing::PriceOracle;
use aggregator_router::calldata::{self, CalldataFetcher};
use aggregator_store::implementations::memory;
use aggregator_store::OrderStore;
use aggregator_swap::implementations::fixed;
use aggregator_swap::SwapQuoter;

/// Assembles an [`Aggregator`] from the configured drivers.
pub fn build_aggregator(config: &AggregatorConfig) -> Result<Aggregator> {
	let components = &config.components;

	let store: Arc<dyn OrderStore> = match components.store.driver.as_str() {
		"memory" => Arc::from(memory::create_store(&components.store.config)),
		other => bail!("unknown store driver '{other}'"),
	};
	let oracle: Arc<dyn PriceOracle> = match components.pricing.driver.as_str() {
		"static" => Arc::from(static_rates::create_pricing(&components.pricing.config)),
		other => bail!("unknown pricing driver '{other}'"),
	};
	let chain: Arc<dyn ChainReader> = match components.chain.driver.as_str() {
		"static" => Arc::from(static_chain::create_chain(&components.chain.config)),
		"rpc" => Arc::from(rpc::create_chain(&components.chain.config)),
		other => bail!("unknown chain driver '{other}'"),
	};
	let quoter: Arc<dyn SwapQuoter> = match components.swap.driver.as_str() {
		"fixed" => Arc::from(fixed::create_swap(&components.swap.config)),
		other => bail!("unknown swap driver '{other}'"),
	};
	let fetcher: Arc<dyn CalldataFetcher> = match components.calldata.driver.as_str() {
		"http" => Arc::from(calldata::create_calldata(&components.calldata.config)),
		other => bail!("unknown calldata driver '{other}'"),
	};

	Ok(Aggregator::new(config, store, oracle, chain, quoter, fetcher))
}
