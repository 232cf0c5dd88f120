//! Buy flow orchestration.
//!
//! [`Aggregator`] wires the path builder and the execution planner into one
//! request pipeline: price the request into a path, compile the path into
//! transactions, check the taker can afford them and sequence the client
//! steps. Implementations of the storage, pricing, chain, swap and calldata
//! seams are injected at construction, so the pipeline itself stays free of
//! transport concerns.

mod preflight;
mod steps;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use aggregator_chain::ChainReader;
use aggregator_config::{AggregatorConfig, FillSettings};
use aggregator_path::PathBuilder;
use aggregator_pricing::{CurrencyRegistry, PriceOracle};
use aggregator_router::calldata::CalldataFetcher;
use aggregator_router::Router;
use aggregator_store::OrderStore;
use aggregator_swap::SwapQuoter;
use aggregator_types::{
	BuyRequest, ExecuteStep, FillError, FillOutput, FlowState, MaxQuantity, OnErrorHook,
	OrderError, OrderId, PathItem,
};

/// Complete answer to a buy request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyResponse {
	/// Correlation id, also attached to every log line of the request.
	#[serde(rename = "requestId")]
	pub request_id: String,
	/// Whether the plan is executable or blocked on authentication.
	pub state: FlowState,
	/// Ordered client to-do list.
	pub steps: Vec<ExecuteStep>,
	/// Priced fill path, restricted to entries some transaction covers.
	pub path: Vec<PathItem>,
	/// Maximum fillable quantity per request item, when probed.
	#[serde(default, rename = "maxQuantities", skip_serializing_if = "Vec::is_empty")]
	pub max_quantities: Vec<MaxQuantity>,
	/// Orders that fell out along the way, with reasons.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub errors: Vec<OrderError>,
	/// Set when the taker's balance cannot cover the plan.
	#[serde(default, rename = "balanceWarning", skip_serializing_if = "Option::is_none")]
	pub balance_warning: Option<String>,
}

/// The aggregator pipeline.
pub struct Aggregator {
	fill: FillSettings,
	chain: Arc<dyn ChainReader>,
	paths: PathBuilder,
	router: Router,
}

impl std::fmt::Debug for Aggregator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Aggregator").finish_non_exhaustive()
	}
}

impl Aggregator {
	pub fn new(
		config: &AggregatorConfig,
		store: Arc<dyn OrderStore>,
		oracle: Arc<dyn PriceOracle>,
		chain: Arc<dyn ChainReader>,
		quoter: Arc<dyn SwapQuoter>,
		fetcher: Arc<dyn CalldataFetcher>,
	) -> Self {
		let registry = Arc::new(CurrencyRegistry::new(
			config.currencies.clone(),
			config.addresses.wrapped_native,
		));
		let paths = PathBuilder::new(
			store,
			oracle,
			chain.clone(),
			registry.clone(),
			config.fees.clone(),
			config.fill.clone(),
		);
		let router = Router::new(
			config.addresses.clone(),
			config.chain.clone(),
			config.fill.clone(),
			registry,
			quoter,
			fetcher,
			chain.clone(),
		);
		Aggregator {
			fill: config.fill.clone(),
			chain,
			paths,
			router,
		}
	}

	/// Installs an observer notified of every order-scoped failure, in both
	/// the path and planning stages.
	pub fn with_hook(mut self, hook: Arc<dyn OnErrorHook>) -> Self {
		self.paths = self.paths.with_hook(hook.clone());
		self.router = self.router.with_hook(hook);
		self
	}

	/// Runs the full pipeline for one buy request, under the configured time
	/// budget. Requests that exceed the budget fail with a retryable
	/// [`FillError::Timeout`] rather than holding the caller indefinitely.
	pub async fn execute_buy(&self, request: &BuyRequest) -> Result<BuyResponse, FillError> {
		let request_id = Uuid::new_v4().to_string();
		let span = info_span!("buy", request_id = %request_id);
		let budget = Duration::from_secs(self.fill.request_timeout_secs);
		match tokio::time::timeout(budget, self.run(&request_id, request).instrument(span)).await {
			Ok(result) => result,
			Err(_) => {
				warn!(
					request_id = %request_id,
					budget_secs = self.fill.request_timeout_secs,
					"buy request ran out of time"
				);
				Err(FillError::Timeout)
			}
		}
	}

	async fn run(&self, request_id: &str, request: &BuyRequest) -> Result<BuyResponse, FillError> {
		let built = self.paths.build(request).await?;
		let taker = request.taker;
		let buy_in = built.buy_in_currency;
		info!(
			items = request.items.len(),
			listings = built.listings.len(),
			mints = built.mints.len(),
			buy_in = %buy_in,
			"path built"
		);

		// Nothing downstream is worth compiling while a marketplace session
		// is missing: fetched calldata would be refused anyway. The path is
		// still returned so the client can show what it is signing in for.
		if let Some(auth) = steps::auth_step(&built.listings, taker, &request.options) {
			info!(sources = auth.items.len(), "buy blocked on authentication");
			return Ok(BuyResponse {
				request_id: request_id.to_string(),
				state: FlowState::AwaitingAuth,
				steps: vec![auth],
				path: built.path,
				max_quantities: built.max_quantities,
				errors: built.errors,
				balance_warning: None,
			});
		}

		let mut fill = self
			.router
			.fill_listings_tx(&built.listings, taker, buy_in, &request.options)
			.await?;
		merge_outputs(
			&mut fill,
			self.router.fill_mints_tx(&built.mints, taker, &request.options)?,
		);

		let path = planned_path(built.path, &fill.success);
		let balance_warning = if request.options.skip_balance_check {
			None
		} else {
			preflight::balance_warning(self.chain.as_ref(), taker, buy_in, &path).await
		};
		let steps = steps::sequence(self.chain.as_ref(), &fill).await;

		let mut errors = built.errors;
		errors.append(&mut fill.errors);
		info!(
			txs = fill.txs.len(),
			steps = steps.len(),
			errors = errors.len(),
			"plan ready"
		);
		Ok(BuyResponse {
			request_id: request_id.to_string(),
			state: FlowState::Ready,
			steps,
			path,
			max_quantities: built.max_quantities,
			errors,
			balance_warning,
		})
	}
}

/// Keeps the path entries some planned transaction actually covers.
fn planned_path(path: Vec<PathItem>, success: &HashMap<OrderId, bool>) -> Vec<PathItem> {
	path.into_iter()
		.filter(|item| success.get(&item.order_id).copied().unwrap_or(false))
		.collect()
}

fn merge_outputs(into: &mut FillOutput, from: FillOutput) {
	into.txs.extend(from.txs);
	into.success.extend(from.success);
	into.errors.extend(from.errors);
	into.pre_signatures.extend(from.pre_signatures);
	into.auth_transactions.extend(from.auth_transactions);
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use serde_json::json;

	use aggregator_chain::implementations::static_chain::StaticChainReader;
	use aggregator_pricing::implementations::static_rates::{StaticRateOracle, StaticRatesConfig};
	use aggregator_router::calldata::{CalldataBatch, CalldataFetcher, FetchError, FetchedBatch};
	use aggregator_store::implementations::memory::MemoryStore;
	use aggregator_swap::implementations::fixed::{FixedSwapConfig, FixedSwapQuoter};
	use aggregator_types::{
		ContractKind, FeeBreakdown, FeeKind, FillOptions, FillType, MintCalldataTemplate,
		MintParam, MintParamKind, MintStageKind, MintStatus, MintTxTemplate, NormalizedOrder,
		OpenMint, OrderKind, OrderStatus, RequestItem, StepId, TokenRef, NATIVE_CURRENCY,
	};
	use alloy_primitives::{Address, U256};

	struct NeverFetcher;

	#[async_trait]
	impl CalldataFetcher for NeverFetcher {
		async fn fetch_batch(&self, _batch: &CalldataBatch) -> Result<FetchedBatch, FetchError> {
			Err(FetchError::Transient("no marketplace client".to_string()))
		}
	}

	fn taker() -> Address {
		Address::repeat_byte(0x7a)
	}

	fn nft_contract() -> Address {
		Address::repeat_byte(0x22)
	}

	fn parts() -> (Arc<MemoryStore>, Arc<StaticChainReader>, Aggregator) {
		let config = AggregatorConfig::default();
		let store = Arc::new(MemoryStore::new());
		let chain = Arc::new(StaticChainReader::new());
		let oracle = Arc::new(StaticRateOracle::new(StaticRatesConfig {
			rates: vec![],
			max_age_secs: 300,
			wrapped_native: Some(config.addresses.wrapped_native),
		}));
		let quoter = Arc::new(FixedSwapQuoter::new(FixedSwapConfig {
			routes: vec![],
			recipient: None,
		}));
		let aggregator = Aggregator::new(
			&config,
			store.clone(),
			oracle,
			chain.clone(),
			quoter,
			Arc::new(NeverFetcher),
		);
		(store, chain, aggregator)
	}

	fn listing(id: &str, kind: OrderKind, token_id: u64, price: u64) -> NormalizedOrder {
		NormalizedOrder {
			id: id.to_string(),
			kind,
			status: OrderStatus::Active,
			maker: Address::repeat_byte(0x51),
			taker: None,
			contract: nft_contract(),
			token_id: Some(U256::from(token_id)),
			currency: NATIVE_CURRENCY,
			price: U256::from(price),
			quantity_remaining: 1,
			source: Some("opensea.io".to_string()),
			fee_breakdown: vec![],
			missing_royalties: vec![],
			expiration: None,
			raw_data: serde_json::Value::Null,
		}
	}

	fn seed_721_listing(store: &MemoryStore, chain: &StaticChainReader, order: NormalizedOrder) {
		store.seed_contract(order.contract, ContractKind::Erc721);
		if let Some(token_id) = order.token_id {
			chain.seed_erc721(order.contract, token_id, order.maker);
		}
		store.seed_order(order);
	}

	fn token_request(token_id: u64) -> BuyRequest {
		BuyRequest {
			taker: taker(),
			items: vec![RequestItem {
				token: Some(TokenRef {
					contract: nft_contract(),
					token_id: U256::from(token_id),
				}),
				quantity: 1,
				..Default::default()
			}],
			options: FillOptions::default(),
		}
	}

	#[tokio::test]
	async fn test_buy_produces_ready_plan_with_sale_step() {
		let (store, chain, aggregator) = parts();
		let mut order = listing("order-1", OrderKind::Seaport, 1, 1_000_000);
		order.fee_breakdown = vec![FeeBreakdown {
			kind: FeeKind::Royalty,
			recipient: Address::repeat_byte(0x99),
			bps: 250,
		}];
		seed_721_listing(&store, &chain, order);
		chain.seed_native(taker(), U256::from(2_000_000));

		let response = aggregator.execute_buy(&token_request(1)).await.unwrap();
		assert_eq!(response.state, FlowState::Ready);
		assert!(Uuid::parse_str(&response.request_id).is_ok());
		assert!(response.balance_warning.is_none());
		assert!(response.errors.is_empty());

		assert_eq!(response.path.len(), 1);
		let entry = &response.path[0];
		assert_eq!(entry.order_id, "order-1");
		assert_eq!(entry.raw_quote, U256::from(1_000_000));
		assert_eq!(entry.total_raw_price, U256::from(1_000_000));
		assert_eq!(entry.built_in_fees.len(), 1);
		assert_eq!(entry.built_in_fees[0].bps, 250);
		assert!(entry.fees_on_top.is_empty());

		// Single native Seaport listing goes straight to the exchange.
		assert_eq!(response.steps.len(), 1);
		let sale = &response.steps[0];
		assert_eq!(sale.id, StepId::Sale);
		assert_eq!(sale.items.len(), 1);
		assert_eq!(sale.items[0].order_ids, vec!["order-1".to_string()]);
		let tx = sale.items[0].data.as_ref().unwrap();
		assert_eq!(tx["from"], json!(taker()));
		assert_eq!(
			tx["to"],
			json!(AggregatorConfig::default().addresses.exchange("seaport").unwrap())
		);
	}

	#[tokio::test]
	async fn test_auth_gated_listing_pauses_the_flow() {
		let (store, chain, aggregator) = parts();
		let mut order = listing("blur-1", OrderKind::Blur, 1, 500_000);
		order.source = Some("blur.io".to_string());
		seed_721_listing(&store, &chain, order);

		let response = aggregator.execute_buy(&token_request(1)).await.unwrap();
		assert_eq!(response.state, FlowState::AwaitingAuth);
		assert_eq!(response.steps.len(), 1);
		assert_eq!(response.steps[0].id, StepId::Auth);
		assert_eq!(response.path.len(), 1);
		assert!(response.balance_warning.is_none());

		// With the session token supplied the flow proceeds to planning and
		// reaches the calldata fetcher.
		let mut request = token_request(1);
		request
			.options
			.auth_tokens
			.insert("blur.io".to_string(), "tok".to_string());
		let err = aggregator.execute_buy(&request).await.unwrap_err();
		assert!(!err.is_unrecoverable());
		assert!(err.to_string().contains("no marketplace client"));
	}

	#[tokio::test]
	async fn test_balance_warning_on_short_funds() {
		let (store, chain, aggregator) = parts();
		seed_721_listing(&store, &chain, listing("order-1", OrderKind::Seaport, 1, 600));

		let response = aggregator.execute_buy(&token_request(1)).await.unwrap();
		assert!(response
			.balance_warning
			.unwrap()
			.contains("below the plan total 600"));

		let mut request = token_request(1);
		request.options.skip_balance_check = true;
		let response = aggregator.execute_buy(&request).await.unwrap();
		assert!(response.balance_warning.is_none());
	}

	#[tokio::test]
	async fn test_mint_and_listing_merge_into_one_plan() {
		let (store, chain, aggregator) = parts();
		seed_721_listing(&store, &chain, listing("order-1", OrderKind::Seaport, 1, 1_000));
		let collection = nft_contract().to_string();
		store.seed_mint(OpenMint {
			collection: collection.clone(),
			contract: nft_contract(),
			stage: "public-sale".to_string(),
			kind: MintStageKind::Public,
			status: MintStatus::Open,
			currency: NATIVE_CURRENCY,
			price: U256::from(500),
			max_mints_per_wallet: None,
			token_id: None,
			allowlist: None,
			tx_template: MintTxTemplate {
				to: nft_contract(),
				calldata: MintCalldataTemplate {
					signature: "0xa0712d68".to_string(),
					params: vec![MintParam {
						kind: MintParamKind::Quantity,
						abi_type: "uint256".to_string(),
						value: None,
					}],
				},
			},
		});
		chain.seed_native(taker(), U256::from(10_000));

		let mut request = token_request(1);
		request.items.push(RequestItem {
			collection: Some(collection.clone()),
			quantity: 1,
			fill_type: Some(FillType::Mint),
			..Default::default()
		});
		let response = aggregator.execute_buy(&request).await.unwrap();
		assert_eq!(response.state, FlowState::Ready);
		assert!(response.errors.is_empty());
		assert_eq!(response.path.len(), 2);
		let mint_id = format!("mint:{collection}");
		assert!(response.path.iter().any(|item| item.order_id == mint_id));

		let sale = response
			.steps
			.iter()
			.find(|step| step.id == StepId::Sale)
			.unwrap();
		assert_eq!(sale.items.len(), 2);
	}

	#[tokio::test]
	async fn test_no_orders_is_reported_as_unfillable() {
		let (_store, _chain, aggregator) = parts();
		let err = aggregator.execute_buy(&token_request(1)).await.unwrap_err();
		assert!(matches!(err, FillError::NoFillableOrders));
	}

	#[tokio::test]
	async fn test_partial_mode_reports_misses_and_keeps_plan() {
		let (store, chain, aggregator) = parts();
		seed_721_listing(&store, &chain, listing("order-1", OrderKind::Seaport, 1, 1_000));
		chain.seed_native(taker(), U256::from(10_000));

		let mut request = token_request(1);
		request.items.push(RequestItem {
			token: Some(TokenRef {
				contract: nft_contract(),
				token_id: U256::from(9),
			}),
			quantity: 1,
			..Default::default()
		});
		request.options.partial = true;

		let response = aggregator.execute_buy(&request).await.unwrap();
		assert_eq!(response.state, FlowState::Ready);
		assert_eq!(response.path.len(), 1);
		assert_eq!(response.path[0].order_id, "order-1");
		assert!(!response.errors.is_empty());
	}
}
