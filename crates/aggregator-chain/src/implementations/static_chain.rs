//! Table-driven chain reader.
//!
//! Serves balances, allowances and ownership out of in-memory maps, seeded
//! from a fixtures file or through the `seed_*` methods. Used by tests and
//! the service's local planning mode.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;

use aggregator_types::u256_string;
use alloy_primitives::{Address, Bytes, U256};

use crate::{ChainError, ChainReader};

/// Native balance entry in a fixtures file.
#[derive(Debug, Clone, Deserialize)]
pub struct NativeBalanceEntry {
	pub owner: Address,
	#[serde(with = "u256_string")]
	pub balance: U256,
}

/// ERC-20 balance entry in a fixtures file.
#[derive(Debug, Clone, Deserialize)]
pub struct Erc20BalanceEntry {
	pub token: Address,
	pub owner: Address,
	#[serde(with = "u256_string")]
	pub balance: U256,
}

/// ERC-20 allowance entry in a fixtures file.
#[derive(Debug, Clone, Deserialize)]
pub struct AllowanceEntry {
	pub token: Address,
	pub owner: Address,
	pub spender: Address,
	#[serde(with = "u256_string")]
	pub amount: U256,
}

/// ERC-721 ownership entry in a fixtures file.
#[derive(Debug, Clone, Deserialize)]
pub struct Erc721Entry {
	pub contract: Address,
	#[serde(rename = "tokenId", with = "u256_string")]
	pub token_id: U256,
	pub owner: Address,
}

/// ERC-1155 balance entry in a fixtures file.
#[derive(Debug, Clone, Deserialize)]
pub struct Erc1155Entry {
	pub contract: Address,
	pub owner: Address,
	#[serde(rename = "tokenId", with = "u256_string")]
	pub token_id: U256,
	#[serde(with = "u256_string")]
	pub balance: U256,
}

/// Seed data for the static chain reader.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainFixtures {
	#[serde(default)]
	pub native: Vec<NativeBalanceEntry>,
	#[serde(default)]
	pub erc20: Vec<Erc20BalanceEntry>,
	#[serde(default)]
	pub allowances: Vec<AllowanceEntry>,
	#[serde(default)]
	pub erc721: Vec<Erc721Entry>,
	#[serde(default)]
	pub erc1155: Vec<Erc1155Entry>,
}

#[derive(Default)]
struct Tables {
	native: HashMap<Address, U256>,
	erc20: HashMap<(Address, Address), U256>,
	allowances: HashMap<(Address, Address, Address), U256>,
	erc721: HashMap<(Address, U256), Address>,
	erc1155: HashMap<(Address, Address, U256), U256>,
}

/// [`ChainReader`] answering from fixed tables.
///
/// Missing entries read as zero balances rather than errors, matching how an
/// empty account looks on a real chain.
pub struct StaticChainReader {
	tables: RwLock<Tables>,
}

impl Default for StaticChainReader {
	fn default() -> Self {
		Self::new()
	}
}

impl StaticChainReader {
	pub fn new() -> Self {
		StaticChainReader {
			tables: RwLock::new(Tables::default()),
		}
	}

	pub fn from_fixtures(fixtures: ChainFixtures) -> Self {
		let mut tables = Tables::default();
		for entry in fixtures.native {
			tables.native.insert(entry.owner, entry.balance);
		}
		for entry in fixtures.erc20 {
			tables.erc20.insert((entry.token, entry.owner), entry.balance);
		}
		for entry in fixtures.allowances {
			tables
				.allowances
				.insert((entry.token, entry.owner, entry.spender), entry.amount);
		}
		for entry in fixtures.erc721 {
			tables
				.erc721
				.insert((entry.contract, entry.token_id), entry.owner);
		}
		for entry in fixtures.erc1155 {
			tables.erc1155.insert(
				(entry.contract, entry.owner, entry.token_id),
				entry.balance,
			);
		}
		StaticChainReader {
			tables: RwLock::new(tables),
		}
	}

	pub fn seed_native(&self, owner: Address, balance: U256) {
		self.write().native.insert(owner, balance);
	}

	pub fn seed_erc20(&self, token: Address, owner: Address, balance: U256) {
		self.write().erc20.insert((token, owner), balance);
	}

	pub fn seed_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
		self.write()
			.allowances
			.insert((token, owner, spender), amount);
	}

	pub fn seed_erc721(&self, contract: Address, token_id: U256, owner: Address) {
		self.write().erc721.insert((contract, token_id), owner);
	}

	pub fn seed_erc1155(&self, contract: Address, owner: Address, token_id: U256, balance: U256) {
		self.write()
			.erc1155
			.insert((contract, owner, token_id), balance);
	}

	fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
		self.tables.read().unwrap_or_else(|e| e.into_inner())
	}

	fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
		self.tables.write().unwrap_or_else(|e| e.into_inner())
	}
}

#[async_trait]
impl ChainReader for StaticChainReader {
	async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, ChainError> {
		Err(ChainError::Unsupported("raw calls"))
	}

	async fn native_balance(&self, owner: Address) -> Result<U256, ChainError> {
		Ok(self.read().native.get(&owner).copied().unwrap_or_default())
	}

	async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
		Ok(self
			.read()
			.erc20
			.get(&(token, owner))
			.copied()
			.unwrap_or_default())
	}

	async fn erc20_allowance(
		&self,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, ChainError> {
		Ok(self
			.read()
			.allowances
			.get(&(token, owner, spender))
			.copied()
			.unwrap_or_default())
	}

	async fn erc721_owner(&self, contract: Address, token_id: U256) -> Result<Address, ChainError> {
		Ok(self
			.read()
			.erc721
			.get(&(contract, token_id))
			.copied()
			.unwrap_or(Address::ZERO))
	}

	async fn erc1155_balance(
		&self,
		contract: Address,
		owner: Address,
		token_id: U256,
	) -> Result<U256, ChainError> {
		Ok(self
			.read()
			.erc1155
			.get(&(contract, owner, token_id))
			.copied()
			.unwrap_or_default())
	}
}

/// Factory function to create a static chain reader from configuration.
pub fn create_chain(config: &toml::Value) -> Box<dyn ChainReader> {
	match config.get("fixtures").and_then(|v| v.as_str()) {
		Some(path) => {
			let contents =
				std::fs::read_to_string(path).expect("chain fixtures file must be readable");
			let fixtures: ChainFixtures =
				serde_json::from_str(&contents).expect("chain fixtures must be valid JSON");
			Box::new(StaticChainReader::from_fixtures(fixtures))
		}
		None => Box::new(StaticChainReader::new()),
	}
}
