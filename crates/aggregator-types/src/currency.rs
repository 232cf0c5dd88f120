//! Currency metadata.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Sentinel address representing the chain's native currency.
pub const NATIVE_CURRENCY: Address = Address::ZERO;

/// Metadata for a payment currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
	/// Token contract, or [`NATIVE_CURRENCY`] for the native coin.
	pub contract: Address,
	/// Display symbol, e.g. "ETH" or "USDC".
	pub symbol: String,
	/// Number of decimals used by the token.
	pub decimals: u8,
}

impl Currency {
	/// Whether this currency is the chain's native coin.
	pub fn is_native(&self) -> bool {
		self.contract == NATIVE_CURRENCY
	}
}

/// Returns true when `currency` denotes the native coin.
pub fn is_native(currency: Address) -> bool {
	currency == NATIVE_CURRENCY
}
