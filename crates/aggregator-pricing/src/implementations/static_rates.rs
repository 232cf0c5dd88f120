//! Table-driven price oracle.
//!
//! Rates are integer fractions loaded from configuration. A rate entry
//! `{from, to, numerator, denominator}` converts as
//! `amount * numerator / denominator`; the reverse direction is derived by
//! flipping the fraction, so one entry covers both ways.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use aggregator_types::num::mul_div_floor;
use aggregator_types::u256_string;
use alloy_primitives::{Address, U256};

use crate::{PriceOracle, PricingError};

fn default_max_age() -> u64 {
	300
}

/// One configured conversion rate.
#[derive(Debug, Clone, Deserialize)]
pub struct RateEntry {
	pub from: Address,
	pub to: Address,
	#[serde(with = "u256_string")]
	pub numerator: U256,
	#[serde(with = "u256_string")]
	pub denominator: U256,
	/// Unix timestamp the rate was observed at. Absent means always fresh.
	#[serde(default)]
	pub updated_at: Option<u64>,
}

/// Configuration schema for the static oracle.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticRatesConfig {
	#[serde(default)]
	pub rates: Vec<RateEntry>,
	/// How old a rate may be before money-moving conversions reject it.
	#[serde(default = "default_max_age")]
	pub max_age_secs: u64,
	/// Wrapped-native contract; native and wrapped convert one-to-one.
	#[serde(default)]
	pub wrapped_native: Option<Address>,
}

struct Rate {
	numerator: U256,
	denominator: U256,
	updated_at: Option<u64>,
}

/// [`PriceOracle`] backed by a fixed rate table.
pub struct StaticRateOracle {
	rates: HashMap<(Address, Address), Rate>,
	max_age_secs: u64,
	wrapped_native: Option<Address>,
}

impl StaticRateOracle {
	pub fn new(config: StaticRatesConfig) -> Self {
		let mut rates = HashMap::new();
		for entry in config.rates {
			rates.insert(
				(entry.from, entry.to),
				Rate {
					numerator: entry.numerator,
					denominator: entry.denominator,
					updated_at: entry.updated_at,
				},
			);
		}
		StaticRateOracle {
			rates,
			max_age_secs: config.max_age_secs,
			wrapped_native: config.wrapped_native,
		}
	}

	fn normalize(&self, currency: Address) -> Address {
		match self.wrapped_native {
			Some(wrapped) if currency == Address::ZERO => wrapped,
			_ => currency,
		}
	}

	fn check_freshness(
		&self,
		rate: &Rate,
		from: Address,
		to: Address,
		accept_stale: bool,
	) -> Result<(), PricingError> {
		if accept_stale {
			return Ok(());
		}
		if let Some(updated_at) = rate.updated_at {
			let now = chrono::Utc::now().timestamp().max(0) as u64;
			if now.saturating_sub(updated_at) > self.max_age_secs {
				return Err(PricingError::StaleRate { from, to });
			}
		}
		Ok(())
	}
}

#[async_trait]
impl PriceOracle for StaticRateOracle {
	async fn convert(
		&self,
		from: Address,
		to: Address,
		amount: U256,
		accept_stale: bool,
	) -> Result<U256, PricingError> {
		let norm_from = self.normalize(from);
		let norm_to = self.normalize(to);
		if norm_from == norm_to {
			return Ok(amount);
		}

		if let Some(rate) = self.rates.get(&(norm_from, norm_to)) {
			self.check_freshness(rate, from, to, accept_stale)?;
			return Ok(mul_div_floor(amount, rate.numerator, rate.denominator));
		}
		// Derived reverse direction.
		if let Some(rate) = self.rates.get(&(norm_to, norm_from)) {
			self.check_freshness(rate, from, to, accept_stale)?;
			return Ok(mul_div_floor(amount, rate.denominator, rate.numerator));
		}

		Err(PricingError::NoRate { from, to })
	}
}

/// Factory function to create a price oracle from configuration.
pub fn create_pricing(config: &toml::Value) -> Box<dyn PriceOracle> {
	let config: StaticRatesConfig = config
		.clone()
		.try_into()
		.expect("static pricing config must be valid");
	tracing::debug!(rates = config.rates.len(), "loaded static rate table");
	Box::new(StaticRateOracle::new(config))
}
