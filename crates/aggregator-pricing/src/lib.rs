//! Currency metadata and conversion.
//!
//! Path building quotes everything in raw on-chain units and only converts
//! between currencies in two places: distributing global fees (must succeed)
//! and attaching display quotes in the buy-in currency (best effort). Both go
//! through the [`PriceOracle`] trait.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use aggregator_types::{is_native, Currency, NATIVE_CURRENCY};
use alloy_primitives::{Address, U256};

/// Re-export implementations
pub mod implementations {
	pub mod static_rates;
}

/// Errors that can occur during price conversion.
#[derive(Debug, Error)]
pub enum PricingError {
	/// No rate is known between the two currencies.
	#[error("no conversion rate from {from} to {to}")]
	NoRate { from: Address, to: Address },
	/// A rate exists but is older than the freshness window.
	#[error("conversion rate from {from} to {to} is stale")]
	StaleRate { from: Address, to: Address },
	/// The backing price source failed.
	#[error("pricing backend error: {0}")]
	Backend(String),
}

/// Converts amounts between payment currencies.
#[async_trait]
pub trait PriceOracle: Send + Sync {
	/// Converts `amount` of `from` into `to`, rounding down.
	///
	/// `accept_stale` widens the freshness requirement for display-only
	/// quotes; conversions that move money must pass `false`.
	async fn convert(
		&self,
		from: Address,
		to: Address,
		amount: U256,
		accept_stale: bool,
	) -> Result<U256, PricingError>;
}

/// Lookup table of known currencies.
///
/// Unknown currencies still work throughout the pipeline; they just lose
/// their display symbol and decimals.
pub struct CurrencyRegistry {
	currencies: HashMap<Address, Currency>,
	wrapped_native: Address,
}

impl CurrencyRegistry {
	/// Builds a registry from configured currencies.
	pub fn new(currencies: Vec<Currency>, wrapped_native: Address) -> Self {
		let currencies = currencies
			.into_iter()
			.map(|currency| (currency.contract, currency))
			.collect();
		CurrencyRegistry {
			currencies,
			wrapped_native,
		}
	}

	/// Metadata for a currency, when configured.
	pub fn currency(&self, contract: Address) -> Option<&Currency> {
		self.currencies.get(&contract)
	}

	/// The wrapped form of the native currency.
	pub fn wrapped_native(&self) -> Address {
		self.wrapped_native
	}

	/// Collapses native and wrapped-native into the wrapped contract, the
	/// form swap pools actually trade.
	pub fn normalize_for_pools(&self, currency: Address) -> Address {
		if is_native(currency) {
			self.wrapped_native
		} else {
			currency
		}
	}

	/// Whether two currencies are interchangeable one-to-one.
	pub fn same_unit(&self, a: Address, b: Address) -> bool {
		self.normalize_for_pools(a) == self.normalize_for_pools(b)
	}

	/// The native currency's metadata, if configured.
	pub fn native(&self) -> Option<&Currency> {
		self.currencies.get(&NATIVE_CURRENCY)
	}
}
