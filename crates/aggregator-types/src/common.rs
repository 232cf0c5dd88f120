//! Common identifiers and primitives shared across the aggregator.
//!
//! Orders, path items and execution steps all reference the same small set of
//! identifier types defined here, together with the serde helpers used to keep
//! big integers readable in API payloads.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Durable identifier of a stored order.
///
/// Ids are opaque strings assigned by the order store. Synthetic path entries
/// (e.g. mints) use a prefixed form such as `mint:<collection>`.
pub type OrderId = String;

/// A specific token within an NFT contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRef {
	/// NFT contract address.
	pub contract: Address,
	/// Token id within the contract.
	#[serde(rename = "tokenId", with = "u256_string")]
	pub token_id: U256,
}

impl fmt::Display for TokenRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.contract, self.token_id)
	}
}

impl FromStr for TokenRef {
	type Err = String;

	/// Parses the `<contract>:<tokenId>` form used in request payloads.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (contract, token_id) = s
			.split_once(':')
			.ok_or_else(|| format!("invalid token reference: {s}"))?;
		let contract = Address::from_str(contract)
			.map_err(|e| format!("invalid token contract {contract}: {e}"))?;
		let token_id = U256::from_str_radix(token_id, 10)
			.map_err(|e| format!("invalid token id {token_id}: {e}"))?;
		Ok(TokenRef { contract, token_id })
	}
}

/// Token standard implemented by an NFT contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractKind {
	Erc721,
	Erc1155,
}

/// An unsigned transaction ready to be submitted by the taker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxData {
	/// Sender of the transaction.
	pub from: Address,
	/// Target contract.
	pub to: Address,
	/// ABI-encoded calldata.
	pub data: Bytes,
	/// Native value attached to the call.
	#[serde(with = "u256_string")]
	pub value: U256,
}

/// Serde helper serializing `U256` as a decimal string.
pub mod u256_string {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		U256::from_str_radix(&s, 10).map_err(D::Error::custom)
	}
}

/// Serde helper for optional `U256` fields carried as decimal strings.
pub mod u256_opt_string {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.map(|v| v.to_string()).serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Option::<String>::deserialize(deserializer)? {
			Some(s) => U256::from_str_radix(&s, 10)
				.map(Some)
				.map_err(D::Error::custom),
			None => Ok(None),
		}
	}
}

/// Serde helper for `U256` fields in raw protocol payloads.
///
/// Marketplace payloads are not consistent about number encoding: amounts show
/// up as decimal strings, `0x`-prefixed hex strings or plain JSON numbers
/// depending on the source. This module accepts all three and always
/// serializes back to a decimal string.
pub mod u256_lenient {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		match serde_json::Value::deserialize(deserializer)? {
			serde_json::Value::String(s) => {
				if let Some(hex) = s.strip_prefix("0x") {
					U256::from_str_radix(hex, 16).map_err(D::Error::custom)
				} else {
					U256::from_str_radix(&s, 10).map_err(D::Error::custom)
				}
			}
			serde_json::Value::Number(n) => n
				.as_u64()
				.map(U256::from)
				.ok_or_else(|| D::Error::custom("number out of range")),
			other => Err(D::Error::custom(format!(
				"expected string or number, got {other}"
			))),
		}
	}
}

/// Serde helper for lists of `U256` values carried as decimal strings, such
/// as pool price ladders.
pub mod u256_vec_string {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(values: &[U256], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		values
			.iter()
			.map(|v| v.to_string())
			.collect::<Vec<_>>()
			.serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<U256>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Vec::<String>::deserialize(deserializer)?
			.into_iter()
			.map(|s| {
				if let Some(hex) = s.strip_prefix("0x") {
					U256::from_str_radix(hex, 16).map_err(D::Error::custom)
				} else {
					U256::from_str_radix(&s, 10).map_err(D::Error::custom)
				}
			})
			.collect()
	}
}
