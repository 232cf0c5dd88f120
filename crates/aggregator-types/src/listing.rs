//! Execution-side detail records.
//!
//! Path building produces one [`ListingDetail`] per listing fill and one
//! [`MintDetail`] per mint fill. These carry everything the execution planner
//! needs, so the planner never goes back to the order store.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::common::{u256_opt_string, u256_string, ContractKind, OrderId};
use crate::order::{Fee, OrderKind};

/// Everything the execution planner needs to fill one listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDetail {
	/// Order being filled.
	#[serde(rename = "orderId")]
	pub order_id: OrderId,
	/// Protocol the order settles through.
	pub kind: OrderKind,
	/// NFT contract.
	pub contract: Address,
	/// Token standard of `contract`.
	#[serde(rename = "contractKind")]
	pub contract_kind: ContractKind,
	/// Token id, absent for pool fills.
	#[serde(default, rename = "tokenId", with = "u256_opt_string")]
	pub token_id: Option<U256>,
	/// Units to fill.
	pub quantity: u64,
	/// Whether the token index has the token marked as flagged. Flagged
	/// tokens are refused by some marketplaces.
	#[serde(default)]
	pub flagged: bool,
	/// Order creator.
	pub maker: Address,
	/// Marketplace domain the order came from.
	#[serde(default)]
	pub source: Option<String>,
	/// Payment currency.
	pub currency: Address,
	/// Gross amount for `quantity` units, excluding `fees`.
	#[serde(with = "u256_string")]
	pub price: U256,
	/// Fees the fill must pay on top of `price`: missing royalties and any
	/// global fee slices assigned to this listing.
	#[serde(default)]
	pub fees: Vec<Fee>,
	/// Protocol-native payload for the adapter.
	#[serde(rename = "rawData")]
	pub raw_data: serde_json::Value,
}

impl ListingDetail {
	/// Total spend for this listing: price plus all on-top fees.
	pub fn total_cost(&self) -> U256 {
		self.fees
			.iter()
			.fold(self.price, |acc, fee| acc.saturating_add(fee.amount))
	}
}

/// Kind of mint stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MintStageKind {
	Public,
	Allowlist,
}

/// Lifecycle state of a mint stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MintStatus {
	Open,
	Closed,
}

/// Role a template parameter plays in mint calldata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MintParamKind {
	/// Substituted with the minting wallet.
	Recipient,
	/// Substituted with the number of units minted.
	Quantity,
	/// Substituted with the token id being minted.
	TokenId,
	/// Fixed value taken verbatim from the template.
	Custom,
}

/// One ABI parameter of a mint calldata template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintParam {
	/// How the value is produced.
	pub kind: MintParamKind,
	/// Solidity type of the parameter, e.g. "address" or "uint256".
	#[serde(rename = "abiType")]
	pub abi_type: String,
	/// Fixed value for `custom` parameters.
	#[serde(default)]
	pub value: Option<serde_json::Value>,
}

/// Calldata template for a mint function.
///
/// Mint functions differ per collection, so the store records the 4-byte
/// selector plus a typed parameter list and the planner ABI-encodes the
/// arguments at fill time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintCalldataTemplate {
	/// 4-byte function selector, `0x`-prefixed.
	pub signature: String,
	/// Ordered ABI parameters.
	#[serde(default)]
	pub params: Vec<MintParam>,
}

/// Where and how to mint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintTxTemplate {
	/// Contract receiving the mint transaction.
	pub to: Address,
	/// Calldata template for the mint call.
	pub calldata: MintCalldataTemplate,
}

/// An open mint stage on a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMint {
	/// Collection id the stage belongs to.
	pub collection: String,
	/// NFT contract being minted.
	pub contract: Address,
	/// Stage label, e.g. "public-sale".
	pub stage: String,
	/// Public or allowlist stage.
	pub kind: MintStageKind,
	/// Whether the stage is currently mintable.
	pub status: MintStatus,
	/// Payment currency. Only native-currency mints are fillable.
	pub currency: Address,
	/// Price per minted unit.
	#[serde(with = "u256_string")]
	pub price: U256,
	/// Per-wallet mint cap, if the stage enforces one.
	#[serde(default, rename = "maxMintsPerWallet")]
	pub max_mints_per_wallet: Option<u64>,
	/// Specific token id minted by this stage, if fixed.
	#[serde(default, rename = "tokenId", with = "u256_opt_string")]
	pub token_id: Option<U256>,
	/// Wallets allowed to mint, for allowlist stages.
	#[serde(default)]
	pub allowlist: Option<Vec<Address>>,
	/// Transaction template for the mint call.
	#[serde(rename = "txTemplate")]
	pub tx_template: MintTxTemplate,
}

/// A planned mint fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintDetail {
	/// Collection being minted.
	pub collection: String,
	/// NFT contract being minted.
	pub contract: Address,
	/// Stage label the fill uses.
	pub stage: String,
	/// Token id, when the stage mints a fixed token.
	#[serde(default, rename = "tokenId", with = "u256_opt_string")]
	pub token_id: Option<U256>,
	/// Units to mint.
	pub quantity: u64,
	/// Total price for `quantity` units.
	#[serde(with = "u256_string")]
	pub price: U256,
	/// Payment currency.
	pub currency: Address,
	/// Transaction template for the mint call.
	#[serde(rename = "txTemplate")]
	pub tx_template: MintTxTemplate,
}
