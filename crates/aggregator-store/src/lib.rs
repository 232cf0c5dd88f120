//! Order store abstraction.
//!
//! Path building reads normalized orders, token floors, flag status and open
//! mints through the [`OrderStore`] trait. The aggregator never talks to an
//! indexer directly; any backend that can answer these queries plugs in here.

use async_trait::async_trait;
use thiserror::Error;

use aggregator_types::{
	ContractKind, NormalizedOrder, OpenMint, OrderId, RawOrder, TokenRef,
};
use alloy_primitives::Address;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
	/// The backend failed to answer a query.
	#[error("Backend error: {0}")]
	Backend(String),
	/// A raw order failed validation during ingestion.
	#[error("Invalid order: {0}")]
	InvalidOrder(String),
	/// The contract is not known to the store.
	#[error("Unknown contract: {0}")]
	UnknownContract(Address),
}

/// Filters applied when listing sell orders for a token.
#[derive(Debug, Clone, Default)]
pub struct TokenOrderQuery {
	/// Taker the query runs for. Private listings reserved for a different
	/// taker are filtered out; the zero address matches only open listings.
	pub taker: Address,
	/// Order ids that must not be returned.
	pub exclude_order_ids: Vec<OrderId>,
	/// Sort by royalty-normalized price instead of the raw price.
	pub normalize_royalties: bool,
	/// Maximum number of orders to return.
	pub limit: usize,
	/// Source whose orders win ties at equal price.
	pub preferred_source: Option<String>,
}

/// Trait defining the read interface over normalized marketplace orders.
///
/// All queries concern sell-side liquidity: listings, pool asks and open
/// mints. Returned orders must be fillable at read time; lifecycle filtering
/// beyond that (self-fills, inactive overrides) is the caller's business.
#[async_trait]
pub trait OrderStore: Send + Sync {
	/// Fetches one order by id, regardless of its lifecycle state.
	async fn order_by_id(&self, id: &str) -> Result<Option<NormalizedOrder>, StoreError>;

	/// Lists fillable sell orders for a token, cheapest first.
	///
	/// Sorting uses the per-unit price, royalty-normalized when the query
	/// asks for it. Orders from `preferred_source` win price ties.
	async fn sell_orders_for_token(
		&self,
		token: &TokenRef,
		query: &TokenOrderQuery,
	) -> Result<Vec<NormalizedOrder>, StoreError>;

	/// Returns up to `limit` tokens of a collection, cheapest floor first.
	async fn cheapest_tokens(
		&self,
		collection: &str,
		limit: usize,
	) -> Result<Vec<TokenRef>, StoreError>;

	/// Whether a token is flagged (stolen/suspicious) and must not be
	/// bought.
	async fn token_is_flagged(&self, token: &TokenRef) -> Result<bool, StoreError>;

	/// Token standard implemented by a contract.
	async fn contract_kind(&self, contract: Address) -> Result<ContractKind, StoreError>;

	/// Open mint stages of a collection.
	async fn open_mints(&self, collection: &str) -> Result<Vec<OpenMint>, StoreError>;

	/// Units a wallet has already minted on a collection, across stages.
	async fn wallet_mint_count(
		&self,
		collection: &str,
		wallet: Address,
	) -> Result<u64, StoreError>;

	/// Validates and persists an order supplied inline with a request,
	/// returning its stored form.
	async fn ingest_raw_order(&self, order: &RawOrder) -> Result<NormalizedOrder, StoreError>;
}
