//! In-memory order store.
//!
//! Backs tests and the local planning mode of the service binary. State is
//! seeded from a fixtures file or through the `seed_*` methods and held
//! behind a single lock; queries implement the same ordering contract a real
//! indexer-backed store would.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use aggregator_types::{
	ContractKind, NormalizedOrder, OpenMint, OrderId, RawOrder, TokenRef,
};
use alloy_primitives::{Address, U256};
use serde::Deserialize;
use tracing::debug;

use crate::{OrderStore, StoreError, TokenOrderQuery};

/// Contract standard entry in a fixtures file.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractEntry {
	pub contract: Address,
	pub kind: ContractKind,
}

/// Per-wallet mint count entry in a fixtures file.
#[derive(Debug, Clone, Deserialize)]
pub struct MintCountEntry {
	pub collection: String,
	pub wallet: Address,
	pub count: u64,
}

/// Seed data for the in-memory store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreFixtures {
	#[serde(default)]
	pub orders: Vec<NormalizedOrder>,
	#[serde(default)]
	pub contracts: Vec<ContractEntry>,
	#[serde(default)]
	pub flagged: Vec<TokenRef>,
	#[serde(default)]
	pub mints: Vec<OpenMint>,
	#[serde(default, rename = "mintCounts")]
	pub mint_counts: Vec<MintCountEntry>,
	/// Collection slug aliases, mapping ids like "my-collection" to the
	/// underlying contract.
	#[serde(default)]
	pub collections: HashMap<String, Address>,
}

#[derive(Default)]
struct Inner {
	orders: HashMap<OrderId, NormalizedOrder>,
	contracts: HashMap<Address, ContractKind>,
	flagged: HashSet<TokenRef>,
	mints: Vec<OpenMint>,
	mint_counts: HashMap<(String, Address), u64>,
	collections: HashMap<String, Address>,
	next_raw_id: u64,
}

/// In-memory [`OrderStore`] implementation.
pub struct MemoryStore {
	inner: RwLock<Inner>,
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		MemoryStore {
			inner: RwLock::new(Inner::default()),
		}
	}

	/// Creates a store pre-populated from fixtures.
	pub fn from_fixtures(fixtures: StoreFixtures) -> Self {
		let mut inner = Inner::default();
		for order in fixtures.orders {
			inner.orders.insert(order.id.clone(), order);
		}
		for entry in fixtures.contracts {
			inner.contracts.insert(entry.contract, entry.kind);
		}
		inner.flagged = fixtures.flagged.into_iter().collect();
		inner.mints = fixtures.mints;
		for entry in fixtures.mint_counts {
			inner
				.mint_counts
				.insert((entry.collection, entry.wallet), entry.count);
		}
		inner.collections = fixtures.collections;
		debug!(
			orders = inner.orders.len(),
			mints = inner.mints.len(),
			"seeded in-memory store"
		);
		MemoryStore {
			inner: RwLock::new(inner),
		}
	}

	/// Adds one order.
	pub fn seed_order(&self, order: NormalizedOrder) {
		let mut inner = self.write();
		inner.orders.insert(order.id.clone(), order);
	}

	/// Registers a contract's token standard.
	pub fn seed_contract(&self, contract: Address, kind: ContractKind) {
		self.write().contracts.insert(contract, kind);
	}

	/// Marks a token as flagged.
	pub fn seed_flagged(&self, token: TokenRef) {
		self.write().flagged.insert(token);
	}

	/// Adds an open mint stage.
	pub fn seed_mint(&self, mint: OpenMint) {
		self.write().mints.push(mint);
	}

	/// Records how many units a wallet has already minted.
	pub fn seed_mint_count(&self, collection: &str, wallet: Address, count: u64) {
		self.write()
			.mint_counts
			.insert((collection.to_string(), wallet), count);
	}

	/// Registers a collection slug alias.
	pub fn seed_collection_alias(&self, slug: &str, contract: Address) {
		self.write().collections.insert(slug.to_string(), contract);
	}

	fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
		self.inner.read().unwrap_or_else(|e| e.into_inner())
	}

	fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
		self.inner.write().unwrap_or_else(|e| e.into_inner())
	}

	fn resolve_collection(&self, inner: &Inner, collection: &str) -> Option<Address> {
		collection
			.parse::<Address>()
			.ok()
			.or_else(|| inner.collections.get(collection).copied())
	}
}

fn now_ts() -> u64 {
	chrono::Utc::now().timestamp().max(0) as u64
}

fn is_live(order: &NormalizedOrder, now: u64) -> bool {
	order.is_fillable() && order.expiration.map_or(true, |exp| exp > now)
}

fn total_fee_bps(order: &NormalizedOrder) -> u32 {
	order
		.fee_breakdown
		.iter()
		.map(|fee| fee.bps as u32)
		.sum()
}

#[async_trait]
impl OrderStore for MemoryStore {
	async fn order_by_id(&self, id: &str) -> Result<Option<NormalizedOrder>, StoreError> {
		Ok(self.read().orders.get(id).cloned())
	}

	async fn sell_orders_for_token(
		&self,
		token: &TokenRef,
		query: &TokenOrderQuery,
	) -> Result<Vec<NormalizedOrder>, StoreError> {
		let inner = self.read();
		let now = now_ts();
		let mut orders: Vec<NormalizedOrder> = inner
			.orders
			.values()
			.filter(|order| order.contract == token.contract)
			// Pool orders without a preset token cover every token of the
			// collection.
			.filter(|order| {
				order.token_id.map_or(order.kind.is_pool(), |id| id == token.token_id)
			})
			.filter(|order| is_live(order, now))
			.filter(|order| order.taker_eligible(query.taker))
			.filter(|order| !query.exclude_order_ids.contains(&order.id))
			.cloned()
			.collect();

		orders.sort_by(|a, b| {
			let price_a = a.unit_price(query.normalize_royalties);
			let price_b = b.unit_price(query.normalize_royalties);
			price_a
				.cmp(&price_b)
				.then_with(|| {
					let pref_a = query.preferred_source.as_deref() == a.source.as_deref();
					let pref_b = query.preferred_source.as_deref() == b.source.as_deref();
					pref_b.cmp(&pref_a)
				})
				.then_with(|| total_fee_bps(a).cmp(&total_fee_bps(b)))
				.then_with(|| a.id.cmp(&b.id))
		});

		if query.limit > 0 {
			orders.truncate(query.limit);
		}
		Ok(orders)
	}

	async fn cheapest_tokens(
		&self,
		collection: &str,
		limit: usize,
	) -> Result<Vec<TokenRef>, StoreError> {
		let inner = self.read();
		let contract = self
			.resolve_collection(&inner, collection)
			.ok_or_else(|| StoreError::Backend(format!("unknown collection: {collection}")))?;

		let now = now_ts();
		let mut floors: HashMap<TokenRef, U256> = HashMap::new();
		for order in inner.orders.values() {
			if order.contract != contract || !is_live(order, now) {
				continue;
			}
			let Some(token_id) = order.token_id else {
				continue;
			};
			let token = TokenRef { contract, token_id };
			let price = order.unit_price(false);
			floors
				.entry(token)
				.and_modify(|floor| {
					if price < *floor {
						*floor = price;
					}
				})
				.or_insert(price);
		}

		let mut tokens: Vec<(TokenRef, U256)> = floors.into_iter().collect();
		tokens.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.token_id.cmp(&b.0.token_id)));
		Ok(tokens.into_iter().take(limit).map(|(t, _)| t).collect())
	}

	async fn token_is_flagged(&self, token: &TokenRef) -> Result<bool, StoreError> {
		Ok(self.read().flagged.contains(token))
	}

	async fn contract_kind(&self, contract: Address) -> Result<ContractKind, StoreError> {
		self.read()
			.contracts
			.get(&contract)
			.copied()
			.ok_or(StoreError::UnknownContract(contract))
	}

	async fn open_mints(&self, collection: &str) -> Result<Vec<OpenMint>, StoreError> {
		let inner = self.read();
		let contract = self.resolve_collection(&inner, collection);
		Ok(inner
			.mints
			.iter()
			.filter(|mint| {
				mint.collection == collection || Some(mint.contract) == contract
			})
			.cloned()
			.collect())
	}

	async fn wallet_mint_count(
		&self,
		collection: &str,
		wallet: Address,
	) -> Result<u64, StoreError> {
		Ok(self
			.read()
			.mint_counts
			.get(&(collection.to_string(), wallet))
			.copied()
			.unwrap_or(0))
	}

	async fn ingest_raw_order(&self, order: &RawOrder) -> Result<NormalizedOrder, StoreError> {
		let mut parsed: NormalizedOrder = serde_json::from_value(order.data.clone())
			.map_err(|e| StoreError::InvalidOrder(format!("malformed payload: {e}")))?;
		parsed.kind = order.kind;

		if parsed.maker == Address::ZERO {
			return Err(StoreError::InvalidOrder("maker must be set".to_string()));
		}
		if parsed.contract == Address::ZERO {
			return Err(StoreError::InvalidOrder(
				"contract must be set".to_string(),
			));
		}
		if parsed.price.is_zero() {
			return Err(StoreError::InvalidOrder("price must be positive".to_string()));
		}
		if parsed.quantity_remaining == 0 {
			return Err(StoreError::InvalidOrder(
				"quantity must be positive".to_string(),
			));
		}
		if !is_live(&parsed, now_ts()) {
			return Err(StoreError::InvalidOrder(
				"order is not fillable".to_string(),
			));
		}

		let mut inner = self.write();
		if parsed.id.is_empty() {
			inner.next_raw_id += 1;
			parsed.id = format!("raw:{}", inner.next_raw_id);
		}
		// Raw orders may reference contracts the store has never seen;
		// assume ERC-721 until something says otherwise.
		inner
			.contracts
			.entry(parsed.contract)
			.or_insert(ContractKind::Erc721);
		inner.orders.insert(parsed.id.clone(), parsed.clone());
		Ok(parsed)
	}
}

/// Factory function to create a store from configuration.
pub fn create_store(config: &toml::Value) -> Box<dyn OrderStore> {
	match config.get("fixtures").and_then(|v| v.as_str()) {
		Some(path) => {
			let contents =
				std::fs::read_to_string(path).expect("store fixtures file must be readable");
			let fixtures: StoreFixtures =
				serde_json::from_str(&contents).expect("store fixtures must be valid JSON");
			Box::new(MemoryStore::from_fixtures(fixtures))
		}
		None => Box::new(MemoryStore::new()),
	}
}
