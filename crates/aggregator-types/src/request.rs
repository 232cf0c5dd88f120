//! Buy request types.
//!
//! A request carries a list of items to acquire plus the options steering
//! path building and execution planning. Field names follow the external API
//! convention (camelCase) while the Rust side stays snake_case.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::{OrderId, TokenRef};
use crate::order::{Fee, RawOrder};

/// Preference for how a collection item should be sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillType {
	/// Only fill from secondary-market listings.
	Trade,
	/// Only fill from open mints.
	Mint,
	/// Mints first, then cheapest listings.
	PreferMint,
}

/// One item the taker wants to acquire.
///
/// Exactly one of `token`, `collection`, `order_id` or `raw_order` must be
/// set; the request is rejected otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestItem {
	/// Specific token, as `<contract>:<tokenId>`.
	#[serde(default)]
	pub token: Option<TokenRef>,
	/// Collection id, filled with its cheapest tokens or open mints.
	#[serde(default)]
	pub collection: Option<String>,
	/// A specific stored order to fill.
	#[serde(default, rename = "orderId")]
	pub order_id: Option<OrderId>,
	/// An order supplied inline instead of referencing the store.
	#[serde(default, rename = "rawOrder")]
	pub raw_order: Option<RawOrder>,
	/// Units to acquire. Defaults to one.
	#[serde(default = "default_quantity")]
	pub quantity: u64,
	/// How collection items are sourced. Defaults to mints first.
	#[serde(default, rename = "fillType")]
	pub fill_type: Option<FillType>,
	/// Prefer orders from this marketplace domain when prices tie.
	#[serde(default, rename = "preferredOrderSource")]
	pub preferred_order_source: Option<String>,
}

fn default_quantity() -> u64 {
	1
}

/// Options applying to a whole buy request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FillOptions {
	/// Skip unfillable items instead of failing the request.
	#[serde(default)]
	pub partial: bool,
	/// Charge missing royalties on top of each listing.
	#[serde(default, rename = "normalizeRoyalties")]
	pub normalize_royalties: bool,
	/// Currency the taker pays with. Defaults per the path contents.
	#[serde(default)]
	pub currency: Option<Address>,
	/// Global fees, denominated in the buy-in currency, distributed across
	/// eligible path items.
	#[serde(default, rename = "feesOnTop")]
	pub fees_on_top: Vec<Fee>,
	/// Order ids that must never be used to fill this request.
	#[serde(default, rename = "excludeOrderIds")]
	pub exclude_order_ids: Vec<OrderId>,
	/// Allow filling explicitly referenced orders that are inactive.
	#[serde(default, rename = "allowInactiveOrderIds")]
	pub allow_inactive_order_ids: bool,
	/// Force routing through the router contract even when a direct fill
	/// would be possible.
	#[serde(default, rename = "forceRouter")]
	pub force_router: bool,
	/// Use an EIP-2612 permit instead of an approval transaction for ERC-20
	/// buy-ins.
	#[serde(default, rename = "usePermit")]
	pub use_permit: bool,
	/// Relayer submitting the transactions on the taker's behalf.
	#[serde(default)]
	pub relayer: Option<Address>,
	/// Off-chain authentication tokens keyed by marketplace domain.
	#[serde(default, rename = "authTokens")]
	pub auth_tokens: HashMap<String, String>,
	/// Skip the preflight balance check.
	#[serde(default, rename = "skipBalanceCheck")]
	pub skip_balance_check: bool,
	/// Report the maximum fillable quantity per request item.
	#[serde(default, rename = "maxQuantities")]
	pub max_quantities: bool,
}

/// A buy request: who is buying, what, and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyRequest {
	/// Wallet receiving the NFTs and paying for them.
	pub taker: Address,
	/// Items to acquire, in priority order.
	pub items: Vec<RequestItem>,
	/// Request-wide options.
	#[serde(default, flatten)]
	pub options: FillOptions,
}
