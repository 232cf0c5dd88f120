//! Fill path types.
//!
//! The path is the priced answer to "what exactly will this request buy":
//! one entry per (order, quantity) pairing chosen by the path builder, with
//! per-item quotes and any global fees that were spread over it.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::common::{u256_opt_string, u256_string, OrderId};
use crate::num::fee_from_bps;
use crate::order::{FeeBreakdown, FeeKind, OrderKind};

/// A fee already included in an order's price, reported per path entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltInFee {
	/// What the fee pays for.
	pub kind: FeeKind,
	/// Address receiving the fee.
	pub recipient: Address,
	/// Fee size in basis points of the entry's raw quote.
	pub bps: u16,
	/// Fee size in raw currency units, derived from `bps`.
	#[serde(rename = "rawAmount", with = "u256_string")]
	pub raw_amount: U256,
}

impl BuiltInFee {
	/// Materializes a stored fee breakdown against a concrete quote.
	pub fn from_breakdown(breakdown: &FeeBreakdown, raw_quote: U256) -> Self {
		BuiltInFee {
			kind: breakdown.kind,
			recipient: breakdown.recipient,
			bps: breakdown.bps,
			raw_amount: fee_from_bps(raw_quote, breakdown.bps),
		}
	}
}

/// A global fee slice applied to one path item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedFee {
	/// Address receiving the fee.
	pub recipient: Address,
	/// Slice amount, in the item's currency.
	#[serde(with = "u256_string")]
	pub amount: U256,
	/// Slice size in basis points of the item's raw quote. Omitted when the
	/// fee exceeds the quote itself.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bps: Option<u64>,
}

/// One priced entry of the fill path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathItem {
	/// Order backing this entry. Synthetic for mints.
	#[serde(rename = "orderId")]
	pub order_id: OrderId,
	/// Protocol the entry settles through.
	pub kind: OrderKind,
	/// NFT contract.
	pub contract: Address,
	/// Token id, absent for pool fills without a preselected token.
	#[serde(default, rename = "tokenId", with = "u256_opt_string")]
	pub token_id: Option<U256>,
	/// Units taken from the order.
	pub quantity: u64,
	/// Marketplace domain the order came from.
	#[serde(default)]
	pub source: Option<String>,
	/// Currency the order is paid in.
	pub currency: Address,
	/// Display symbol of `currency`, when known.
	#[serde(default, rename = "currencySymbol")]
	pub currency_symbol: Option<String>,
	/// Decimals of `currency`, when known.
	#[serde(default, rename = "currencyDecimals")]
	pub currency_decimals: Option<u8>,
	/// Gross amount for this entry in `currency`, excluding global fees.
	#[serde(rename = "rawQuote", with = "u256_string")]
	pub raw_quote: U256,
	/// `raw_quote` plus this entry's share of global fees.
	#[serde(rename = "totalRawPrice", with = "u256_string")]
	pub total_raw_price: U256,
	/// Fees already contained in `raw_quote`, for reporting.
	#[serde(default, rename = "builtInFees")]
	pub built_in_fees: Vec<BuiltInFee>,
	/// Global fee slices charged on this entry.
	#[serde(default, rename = "feesOnTop")]
	pub fees_on_top: Vec<AppliedFee>,
	/// Currency the taker actually pays with, when it differs.
	#[serde(default, rename = "buyInCurrency")]
	pub buy_in_currency: Option<Address>,
	/// Best-effort quote of `total_raw_price` in the buy-in currency.
	#[serde(default, rename = "buyInRawQuote", with = "u256_opt_string")]
	pub buy_in_raw_quote: Option<U256>,
	/// Estimated gas cost of filling this entry, when an estimate exists.
	#[serde(
		default,
		rename = "gasCost",
		with = "u256_opt_string",
		skip_serializing_if = "Option::is_none"
	)]
	pub gas_cost: Option<U256>,
	/// Chain the fill originates from. Absent for same-chain fills.
	#[serde(default, rename = "originChainId", skip_serializing_if = "Option::is_none")]
	pub origin_chain_id: Option<u64>,
}

impl PathItem {
	/// Registers a global fee slice against this entry.
	pub fn add_fee_on_top(&mut self, fee: AppliedFee) {
		self.total_raw_price = self.total_raw_price.saturating_add(fee.amount);
		self.fees_on_top.push(fee);
	}
}

/// Maximum fillable quantity discovered for one request item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxQuantity {
	/// Index of the request item this applies to.
	#[serde(rename = "itemIndex")]
	pub item_index: usize,
	/// Units that could actually be filled.
	#[serde(rename = "maxQuantity")]
	pub max_quantity: u64,
}
