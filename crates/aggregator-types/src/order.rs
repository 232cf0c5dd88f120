//! Normalized order types.
//!
//! Every marketplace listing, whatever protocol it originates from, is stored
//! in the normalized shape defined here. Protocol-specific payloads travel in
//! `raw_data` and are only interpreted by the matching protocol adapter when
//! calldata is built.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::{u256_opt_string, u256_string, OrderId};

/// Marketplace protocol an order settles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderKind {
	Seaport,
	#[serde(rename = "seaport-v1.4")]
	SeaportV14,
	#[serde(rename = "seaport-v1.5")]
	SeaportV15,
	#[serde(rename = "seaport-v1.6")]
	SeaportV16,
	Alienswap,
	Blur,
	BlurPartial,
	LooksRareV2,
	X2y2,
	ZeroexV4Erc721,
	ZeroexV4Erc1155,
	Sudoswap,
	SudoswapV2,
	Nftx,
	NftxV3,
	ElementErc721,
	ElementErc1155,
	Rarible,
	Foundation,
	SuperRare,
	Cryptopunks,
	ZoraV3,
	Manifold,
	PaymentProcessor,
	Mint,
}

impl OrderKind {
	/// Stable string form, matching the serde representation.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderKind::Seaport => "seaport",
			OrderKind::SeaportV14 => "seaport-v1.4",
			OrderKind::SeaportV15 => "seaport-v1.5",
			OrderKind::SeaportV16 => "seaport-v1.6",
			OrderKind::Alienswap => "alienswap",
			OrderKind::Blur => "blur",
			OrderKind::BlurPartial => "blur-partial",
			OrderKind::LooksRareV2 => "looks-rare-v2",
			OrderKind::X2y2 => "x2y2",
			OrderKind::ZeroexV4Erc721 => "zeroex-v4-erc721",
			OrderKind::ZeroexV4Erc1155 => "zeroex-v4-erc1155",
			OrderKind::Sudoswap => "sudoswap",
			OrderKind::SudoswapV2 => "sudoswap-v2",
			OrderKind::Nftx => "nftx",
			OrderKind::NftxV3 => "nftx-v3",
			OrderKind::ElementErc721 => "element-erc721",
			OrderKind::ElementErc1155 => "element-erc1155",
			OrderKind::Rarible => "rarible",
			OrderKind::Foundation => "foundation",
			OrderKind::SuperRare => "super-rare",
			OrderKind::Cryptopunks => "cryptopunks",
			OrderKind::ZoraV3 => "zora-v3",
			OrderKind::Manifold => "manifold",
			OrderKind::PaymentProcessor => "payment-processor",
			OrderKind::Mint => "mint",
		}
	}

	/// AMM-style orders priced by a pool ladder rather than a fixed price.
	pub fn is_pool(&self) -> bool {
		matches!(
			self,
			OrderKind::Sudoswap | OrderKind::SudoswapV2 | OrderKind::Nftx | OrderKind::NftxV3
		)
	}

	/// Seaport and its conduit-compatible forks.
	pub fn is_seaport_family(&self) -> bool {
		matches!(
			self,
			OrderKind::Seaport
				| OrderKind::SeaportV14
				| OrderKind::SeaportV15
				| OrderKind::SeaportV16
				| OrderKind::Alienswap
		)
	}

	/// Protocols whose fill calldata must be fetched from an external
	/// service instead of being built locally.
	pub fn uses_fetched_calldata(&self) -> bool {
		matches!(
			self,
			OrderKind::Blur | OrderKind::BlurPartial | OrderKind::X2y2
		)
	}

	/// Protocols that cannot run through the router and always get a
	/// dedicated taker transaction.
	pub fn requires_dedicated_tx(&self) -> bool {
		matches!(
			self,
			OrderKind::Foundation | OrderKind::SuperRare | OrderKind::Manifold
		)
	}

	/// Protocols gated behind an off-chain authentication handshake.
	pub fn requires_offchain_auth(&self) -> bool {
		matches!(self, OrderKind::Blur | OrderKind::BlurPartial)
	}

	/// Protocols requiring an on-chain taker registration before filling.
	pub fn requires_auth_transaction(&self) -> bool {
		matches!(self, OrderKind::PaymentProcessor)
	}
}

impl fmt::Display for OrderKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Lifecycle state of a stored order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
	Active,
	Inactive,
	Filled,
	Cancelled,
	Expired,
}

/// A concrete fee payout: recipient plus absolute amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
	/// Address receiving the fee.
	pub recipient: Address,
	/// Fee amount in the relevant currency's smallest unit.
	#[serde(with = "u256_string")]
	pub amount: U256,
}

/// Classification of a fee baked into an order's quoted price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeeKind {
	Marketplace,
	Royalty,
}

/// One component of an order's built-in fee structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
	/// What the fee pays for.
	pub kind: FeeKind,
	/// Address receiving the fee.
	pub recipient: Address,
	/// Fee size in basis points of the order price.
	pub bps: u16,
}

/// A marketplace order in the store's normalized shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedOrder {
	/// Durable order id.
	pub id: OrderId,
	/// Protocol the order settles through.
	pub kind: OrderKind,
	/// Current lifecycle state.
	pub status: OrderStatus,
	/// Order creator. Fills by this address are rejected as self-fills.
	pub maker: Address,
	/// Taker the order is reserved for. Absent or zero means anyone can
	/// fill.
	#[serde(default)]
	pub taker: Option<Address>,
	/// NFT contract being sold.
	pub contract: Address,
	/// Token id, absent for pool orders that cover a whole collection.
	#[serde(default, rename = "tokenId", with = "u256_opt_string")]
	pub token_id: Option<U256>,
	/// Payment currency of the order.
	pub currency: Address,
	/// Gross price per unit, inclusive of the order's built-in fees.
	#[serde(with = "u256_string")]
	pub price: U256,
	/// Units still available to fill.
	#[serde(rename = "quantityRemaining")]
	pub quantity_remaining: u64,
	/// Marketplace domain the order was sourced from, e.g. "opensea.io".
	#[serde(default)]
	pub source: Option<String>,
	/// Fees already included in `price`, for reporting.
	#[serde(default, rename = "feeBreakdown")]
	pub fee_breakdown: Vec<FeeBreakdown>,
	/// Royalties the order does not pay, charged per unit on top when
	/// royalty normalization is requested.
	#[serde(default, rename = "missingRoyalties")]
	pub missing_royalties: Vec<Fee>,
	/// Unix timestamp after which the order is no longer fillable.
	#[serde(default)]
	pub expiration: Option<u64>,
	/// Protocol-specific payload consumed by the matching adapter.
	#[serde(default, rename = "rawData")]
	pub raw_data: serde_json::Value,
}

impl NormalizedOrder {
	/// Per-unit price used for path building.
	///
	/// With royalty normalization the missing royalties are treated as part
	/// of the price, since the filler will be charged them on top.
	pub fn unit_price(&self, normalize_royalties: bool) -> U256 {
		if normalize_royalties {
			self.missing_royalties
				.iter()
				.fold(self.price, |acc, fee| acc.saturating_add(fee.amount))
		} else {
			self.price
		}
	}

	/// Whether the order can still be filled at all.
	pub fn is_fillable(&self) -> bool {
		self.status == OrderStatus::Active && self.quantity_remaining > 0
	}

	/// Whether `taker` may fill this order. Orders are open to everyone
	/// unless reserved for one specific taker.
	pub fn taker_eligible(&self, taker: Address) -> bool {
		match self.taker {
			None => true,
			Some(reserved) => reserved.is_zero() || reserved == taker,
		}
	}
}

/// An order supplied inline with a request, not yet in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOrder {
	/// Protocol the payload belongs to.
	pub kind: OrderKind,
	/// Protocol-native order payload.
	pub data: serde_json::Value,
}
