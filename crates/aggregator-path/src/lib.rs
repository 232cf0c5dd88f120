//! Path building.
//!
//! Turns a buy request into a priced fill path: picks concrete orders and
//! mint stages for every requested item, prices pool fills off their price
//! ladders, tracks maker inventory so the same unit is never promised twice
//! within one pass, distributes global fees and attaches cross-currency
//! quotes.
//!
//! Items are processed strictly in request order through a work queue;
//! collection items expand into synthetic per-token items pushed onto the
//! back of the same queue. Ordering matters: pool pricing and inventory
//! tracking are path-dependent.

pub mod context;
pub mod fees;
pub mod mints;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use serde::Deserialize;
use tracing::debug;

use aggregator_chain::ChainReader;
use aggregator_config::{FeeSettings, FillSettings};
use aggregator_pricing::{CurrencyRegistry, PriceOracle};
use aggregator_store::{OrderStore, StoreError, TokenOrderQuery};
use aggregator_types::{
	u256_opt_string, u256_vec_string, BuiltInFee, BuyRequest, ContractKind, Fee, FillError,
	FillType, ListingDetail, MaxQuantity, MintDetail, NormalizedOrder, OnErrorHook, OrderError,
	OrderId, OrderKind, OrderStatus, PathItem, RawOrder, RequestItem, TokenRef, NATIVE_CURRENCY,
};

use crate::context::{derived_order_id, pool_key, FillContext, MakerAsset};

/// Pool payload fields the path builder interprets.
///
/// Everything else in the payload travels untouched to the protocol adapter
/// that eventually builds calldata.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolOrderData {
	/// AMM pool the order trades against.
	pub pool: Address,
	/// NFT contract the pool sells.
	pub contract: Address,
	/// Ask price of the i-th unit sold this pass; the last entry repeats.
	#[serde(rename = "priceList", with = "u256_vec_string")]
	pub price_list: Vec<U256>,
	/// Specific token sold, absent when the pool sells any of its tokens.
	#[serde(default, rename = "tokenId", with = "u256_opt_string")]
	pub token_id: Option<U256>,
	/// Settlement currency. Pools trade the native coin unless told
	/// otherwise.
	#[serde(default)]
	pub currency: Option<Address>,
	/// Units the pool has available, when known.
	#[serde(default)]
	pub quantity: Option<u64>,
}

/// Inline Blur listing payload. Price and availability are trusted as given;
/// there is no maker to balance-check.
#[derive(Debug, Clone, Deserialize)]
struct BlurPartialData {
	contract: Address,
	#[serde(rename = "tokenId", with = "aggregator_types::u256_lenient")]
	token_id: U256,
	#[serde(with = "aggregator_types::u256_lenient")]
	price: U256,
	#[serde(default)]
	source: Option<String>,
}

/// Everything one path-building pass produces.
#[derive(Debug, Default)]
pub struct BuiltPath {
	/// Priced fill path, one entry per (order, quantity) take.
	pub path: Vec<PathItem>,
	/// Listing details aligned with the non-mint entries of `path`, in
	/// order.
	pub listings: Vec<ListingDetail>,
	/// Mint details aligned with the mint entries of `path`, in order.
	pub mints: Vec<MintDetail>,
	/// Per-order failures recorded along the way.
	pub errors: Vec<OrderError>,
	/// Maximum fillable quantity per request item, when requested.
	pub max_quantities: Vec<MaxQuantity>,
	/// Currency the taker pays with.
	pub buy_in_currency: Address,
}

/// Units filled for one work item, plus probed spare capacity.
#[derive(Debug, Default, Clone, Copy)]
struct ItemFill {
	filled: u64,
	extra: u64,
}

impl ItemFill {
	fn none() -> Self {
		Self::default()
	}
}

/// One entry of the processing queue. Synthetic items produced by collection
/// expansion keep the index of the request item they came from.
#[derive(Debug, Clone)]
struct WorkItem {
	request_index: usize,
	item: RequestItem,
}

/// Outcome counters of one token's candidate walk.
#[derive(Debug, Default)]
struct WalkStats {
	candidates: usize,
	self_skipped: usize,
	extra: u64,
}

/// Builds fill paths against the configured collaborators.
pub struct PathBuilder {
	store: Arc<dyn OrderStore>,
	oracle: Arc<dyn PriceOracle>,
	chain: Arc<dyn ChainReader>,
	registry: Arc<CurrencyRegistry>,
	fees: FeeSettings,
	fill: FillSettings,
	hook: Option<Arc<dyn OnErrorHook>>,
}

impl PathBuilder {
	pub fn new(
		store: Arc<dyn OrderStore>,
		oracle: Arc<dyn PriceOracle>,
		chain: Arc<dyn ChainReader>,
		registry: Arc<CurrencyRegistry>,
		fees: FeeSettings,
		fill: FillSettings,
	) -> Self {
		PathBuilder {
			store,
			oracle,
			chain,
			registry,
			fees,
			fill,
			hook: None,
		}
	}

	/// Installs an observer notified of every order-scoped failure.
	pub fn with_hook(mut self, hook: Arc<dyn OnErrorHook>) -> Self {
		self.hook = Some(hook);
		self
	}

	/// Builds the fill path for a request.
	///
	/// With `partial` unset the first failure aborts and nothing of the
	/// partially built path escapes. With `partial` set, order-scoped
	/// failures are recorded in [`BuiltPath::errors`] and the pass
	/// continues; request-scoped validation failures still abort.
	pub async fn build(&self, request: &BuyRequest) -> Result<BuiltPath, FillError> {
		validate_request(request)?;

		let mut ctx = FillContext::new();
		let mut out = BuiltPath::default();
		let mut kinds: HashMap<Address, ContractKind> = HashMap::new();
		let mut filled_by_item = vec![0u64; request.items.len()];
		let mut extra_by_item = vec![0u64; request.items.len()];

		let mut queue: VecDeque<WorkItem> = request
			.items
			.iter()
			.enumerate()
			.map(|(request_index, item)| WorkItem {
				request_index,
				item: item.clone(),
			})
			.collect();

		while let Some(work) = queue.pop_front() {
			let outcome = self
				.fill_item(request, &work, &mut queue, &mut ctx, &mut out, &mut kinds)
				.await?;
			filled_by_item[work.request_index] += outcome.filled;
			extra_by_item[work.request_index] += outcome.extra;
		}

		if out.path.is_empty() {
			return Err(FillError::NoFillableOrders);
		}
		if request.options.max_quantities {
			out.max_quantities = filled_by_item
				.iter()
				.zip(&extra_by_item)
				.enumerate()
				.map(|(item_index, (filled, extra))| MaxQuantity {
					item_index,
					max_quantity: filled + extra,
				})
				.collect();
		}

		let buy_in = fees::resolve_buy_in(&out.path, request.options.currency);
		out.buy_in_currency = buy_in;
		fees::distribute_global_fees(
			&mut out.path,
			&mut out.listings,
			&request.options.fees_on_top,
			buy_in,
			self.oracle.as_ref(),
			&self.fees,
		)
		.await?;
		fees::attach_quotes(&mut out.path, buy_in, &self.registry, self.oracle.as_ref()).await;

		debug!(
			items = request.items.len(),
			path = out.path.len(),
			errors = out.errors.len(),
			"path built"
		);
		Ok(out)
	}

	async fn fill_item(
		&self,
		request: &BuyRequest,
		work: &WorkItem,
		queue: &mut VecDeque<WorkItem>,
		ctx: &mut FillContext,
		out: &mut BuiltPath,
		kinds: &mut HashMap<Address, ContractKind>,
	) -> Result<ItemFill, FillError> {
		let item = &work.item;
		if let Some(order_id) = &item.order_id {
			self.fill_order_id(request, order_id, item.quantity, ctx, out, kinds)
				.await
		} else if let Some(raw) = &item.raw_order {
			self.fill_raw_order(request, raw, item.quantity, ctx, out, kinds)
				.await
		} else if let Some(token) = item.token {
			self.fill_token(request, item, token, item.quantity, ctx, out, kinds)
				.await
		} else if let Some(collection) = &item.collection {
			self.fill_collection(request, work, collection, queue, ctx, out)
				.await
		} else {
			Err(FillError::Validation(
				"item names nothing to fill".to_string(),
			))
		}
	}

	async fn fill_order_id(
		&self,
		request: &BuyRequest,
		order_id: &str,
		want: u64,
		ctx: &mut FillContext,
		out: &mut BuiltPath,
		kinds: &mut HashMap<Address, ContractKind>,
	) -> Result<ItemFill, FillError> {
		let partial = request.options.partial;
		if request
			.options
			.exclude_order_ids
			.iter()
			.any(|id| id.as_str() == order_id)
		{
			let error = FillError::UnrecoverableOrder {
				order_id: order_id.to_string(),
				reason: "order is excluded by the request".to_string(),
			};
			self.note_failure(partial, out, Some(order_id.to_string()), error)?;
			return Ok(ItemFill::none());
		}

		let fetched = match self.store.order_by_id(order_id).await {
			Ok(fetched) => fetched,
			Err(e) => {
				self.note_failure(
					partial,
					out,
					Some(order_id.to_string()),
					transient_store(order_id, e),
				)?;
				return Ok(ItemFill::none());
			}
		};
		let Some(order) = fetched else {
			let error = FillError::UnrecoverableOrder {
				order_id: order_id.to_string(),
				reason: "order not found".to_string(),
			};
			self.note_failure(partial, out, Some(order_id.to_string()), error)?;
			return Ok(ItemFill::none());
		};

		self.fill_known_order(
			request,
			&order,
			want,
			request.options.allow_inactive_order_ids,
			ctx,
			out,
			kinds,
		)
		.await
	}

	/// Fills a concrete order the request singled out, clamping the wanted
	/// quantity in partial mode and failing otherwise.
	async fn fill_known_order(
		&self,
		request: &BuyRequest,
		order: &NormalizedOrder,
		want: u64,
		allow_inactive: bool,
		ctx: &mut FillContext,
		out: &mut BuiltPath,
		kinds: &mut HashMap<Address, ContractKind>,
	) -> Result<ItemFill, FillError> {
		let partial = request.options.partial;

		if order.maker == request.taker {
			self.note_failure(partial, out, Some(order.id.clone()), FillError::SelfFill)?;
			return Ok(ItemFill::none());
		}
		if !order.taker_eligible(request.taker) {
			let error = FillError::UnrecoverableOrder {
				order_id: order.id.clone(),
				reason: "order is reserved for another taker".to_string(),
			};
			self.note_failure(partial, out, Some(order.id.clone()), error)?;
			return Ok(ItemFill::none());
		}
		if !allow_inactive {
			if let Some(reason) = fillability_issue(order) {
				let error = FillError::UnrecoverableOrder {
					order_id: order.id.clone(),
					reason,
				};
				self.note_failure(partial, out, Some(order.id.clone()), error)?;
				return Ok(ItemFill::none());
			}
		}

		let headroom = order.quantity_remaining.saturating_sub(ctx.filled(&order.id));
		if headroom == 0 {
			let error = FillError::InsufficientQuantity {
				requested: want,
				available: 0,
			};
			self.note_failure(partial, out, Some(order.id.clone()), error)?;
			return Ok(ItemFill::none());
		}
		if headroom < want && !partial {
			let error = FillError::InsufficientQuantity {
				requested: want,
				available: headroom,
			};
			self.note_failure(false, out, Some(order.id.clone()), error)?;
			return Ok(ItemFill::none());
		}
		let clamped = want.min(headroom);

		match self
			.add_to_path(request, order, clamped, order.token_id, ctx, out, kinds)
			.await
		{
			Ok(took) => {
				if took < clamped && !partial {
					let error = FillError::InsufficientQuantity {
						requested: clamped,
						available: took,
					};
					self.note_failure(false, out, Some(order.id.clone()), error)?;
					return Ok(ItemFill::none());
				}
				let extra = if request.options.max_quantities {
					order.quantity_remaining.saturating_sub(ctx.filled(&order.id))
				} else {
					0
				};
				Ok(ItemFill { filled: took, extra })
			}
			Err(error) => {
				self.note_failure(partial, out, Some(order.id.clone()), error)?;
				Ok(ItemFill::none())
			}
		}
	}

	async fn fill_raw_order(
		&self,
		request: &BuyRequest,
		raw: &RawOrder,
		want: u64,
		ctx: &mut FillContext,
		out: &mut BuiltPath,
		kinds: &mut HashMap<Address, ContractKind>,
	) -> Result<ItemFill, FillError> {
		let partial = request.options.partial;
		match raw.kind {
			OrderKind::Mint => {
				let Some(collection) = raw.data.get("collection").and_then(|v| v.as_str()) else {
					return Err(FillError::Validation(
						"mint raw order must name a collection".to_string(),
					));
				};
				let filled = self
					.fill_from_mints(request, collection, None, want, ctx, out)
					.await?;
				if filled < want {
					let error = if filled == 0 {
						FillError::NoFillableOrders
					} else {
						FillError::InsufficientQuantity {
							requested: want,
							available: filled,
						}
					};
					self.note_failure(partial, out, None, error)?;
				}
				Ok(ItemFill { filled, extra: 0 })
			}
			kind if kind.is_pool() => {
				let order = pool_order_from_raw(kind, &raw.data).map_err(FillError::Validation)?;
				self.fill_known_order(request, &order, want, false, ctx, out, kinds)
					.await
			}
			OrderKind::BlurPartial => {
				let order = blur_partial_order_from_raw(&raw.data).map_err(FillError::Validation)?;
				self.fill_known_order(request, &order, want, false, ctx, out, kinds)
					.await
			}
			_ => {
				let order = match self.store.ingest_raw_order(raw).await {
					Ok(order) => order,
					Err(StoreError::InvalidOrder(reason)) => {
						let order_id = format!("inline:{}", raw.kind);
						let error = FillError::UnrecoverableOrder {
							order_id: order_id.clone(),
							reason,
						};
						self.note_failure(partial, out, Some(order_id), error)?;
						return Ok(ItemFill::none());
					}
					Err(e) => {
						let order_id = format!("inline:{}", raw.kind);
						self.note_failure(
							partial,
							out,
							Some(order_id.clone()),
							transient_store(order_id, e),
						)?;
						return Ok(ItemFill::none());
					}
				};
				self.fill_known_order(request, &order, want, false, ctx, out, kinds)
					.await
			}
		}
	}

	async fn fill_token(
		&self,
		request: &BuyRequest,
		item: &RequestItem,
		token: TokenRef,
		want: u64,
		ctx: &mut FillContext,
		out: &mut BuiltPath,
		kinds: &mut HashMap<Address, ContractKind>,
	) -> Result<ItemFill, FillError> {
		let partial = request.options.partial;
		match self.store.token_is_flagged(&token).await {
			Ok(true) => {
				let error = FillError::UnrecoverableOrder {
					order_id: token.to_string(),
					reason: "token is flagged".to_string(),
				};
				self.note_failure(partial, out, Some(token.to_string()), error)?;
				return Ok(ItemFill::none());
			}
			Ok(false) => {}
			Err(e) => {
				self.note_failure(
					partial,
					out,
					Some(token.to_string()),
					transient_store(token.to_string(), e),
				)?;
				return Ok(ItemFill::none());
			}
		}

		let fill_type = item.fill_type.unwrap_or(FillType::PreferMint);
		let mut filled = 0u64;
		if matches!(fill_type, FillType::Mint | FillType::PreferMint) {
			filled = self
				.fill_from_mints(
					request,
					&token.contract.to_string(),
					Some(token.token_id),
					want,
					ctx,
					out,
				)
				.await?;
		}
		if fill_type == FillType::Mint {
			if filled < want {
				let error = if filled == 0 {
					FillError::NoFillableOrders
				} else {
					FillError::InsufficientQuantity {
						requested: want,
						available: filled,
					}
				};
				self.note_failure(partial, out, None, error)?;
			}
			return Ok(ItemFill { filled, extra: 0 });
		}

		let (walked, stats) = self
			.take_from_token(request, item, token, want - filled, ctx, out, kinds)
			.await?;
		filled += walked;

		if filled < want {
			let error = classify_shortfall(want, filled, &stats);
			self.note_failure(partial, out, None, error)?;
		}
		Ok(ItemFill {
			filled,
			extra: stats.extra,
		})
	}

	/// Walks a token's sell orders cheapest-first, taking until `want` units
	/// are secured. Order-scoped failures are recorded and the walk moves to
	/// the next candidate.
	async fn take_from_token(
		&self,
		request: &BuyRequest,
		item: &RequestItem,
		token: TokenRef,
		want: u64,
		ctx: &mut FillContext,
		out: &mut BuiltPath,
		kinds: &mut HashMap<Address, ContractKind>,
	) -> Result<(u64, WalkStats), FillError> {
		let mut stats = WalkStats::default();
		if want == 0 {
			return Ok((0, stats));
		}

		let query = self.token_query(request, item);
		let candidates = match self.store.sell_orders_for_token(&token, &query).await {
			Ok(candidates) => candidates,
			Err(e) => {
				self.note_failure(
					request.options.partial,
					out,
					Some(token.to_string()),
					transient_store(token.to_string(), e),
				)?;
				return Ok((0, stats));
			}
		};
		stats.candidates = candidates.len();

		let mut filled = 0u64;
		for order in &candidates {
			if filled >= want {
				break;
			}
			if order.maker == request.taker {
				stats.self_skipped += 1;
				debug!(order_id = %order.id, "skipping taker's own order");
				continue;
			}
			match self
				.add_to_path(
					request,
					order,
					want - filled,
					Some(token.token_id),
					ctx,
					out,
					kinds,
				)
				.await
			{
				Ok(took) => filled += took,
				Err(error) => {
					if let Some(hook) = &self.hook {
						hook.on_order_error("path", Some(&order.id), &error);
					}
					out.errors
						.push(OrderError::from_error(Some(order.id.clone()), &error));
					debug!(order_id = %order.id, error = %error, "candidate rejected");
				}
			}
		}

		if request.options.max_quantities {
			// Upper bound: headroom after this pass, without probing maker
			// balances the fill never touched.
			stats.extra = candidates
				.iter()
				.filter(|order| order.maker != request.taker)
				.map(|order| order.quantity_remaining.saturating_sub(ctx.filled(&order.id)))
				.sum();
		}
		Ok((filled, stats))
	}

	/// Expands a collection item: open mints first (unless trading only),
	/// then one synthetic quantity-1 token item per cheapest usable token,
	/// pushed onto the processing queue.
	async fn fill_collection(
		&self,
		request: &BuyRequest,
		work: &WorkItem,
		collection: &str,
		queue: &mut VecDeque<WorkItem>,
		ctx: &mut FillContext,
		out: &mut BuiltPath,
	) -> Result<ItemFill, FillError> {
		let partial = request.options.partial;
		let item = &work.item;
		let want = item.quantity;
		let fill_type = item.fill_type.unwrap_or(FillType::PreferMint);

		let mut filled = 0u64;
		if matches!(fill_type, FillType::Mint | FillType::PreferMint) {
			filled = self
				.fill_from_mints(request, collection, None, want, ctx, out)
				.await?;
		}
		if fill_type == FillType::Mint {
			if filled < want {
				let error = if filled == 0 {
					FillError::NoFillableOrders
				} else {
					FillError::InsufficientQuantity {
						requested: want,
						available: filled,
					}
				};
				self.note_failure(partial, out, None, error)?;
			}
			return Ok(ItemFill { filled, extra: 0 });
		}

		let remaining = want - filled;
		if remaining == 0 {
			return Ok(ItemFill { filled, extra: 0 });
		}

		let tokens = match self
			.store
			.cheapest_tokens(collection, (remaining as usize).saturating_mul(10))
			.await
		{
			Ok(tokens) => tokens,
			Err(e) => {
				self.note_failure(
					partial,
					out,
					Some(collection.to_string()),
					transient_store(collection, e),
				)?;
				return Ok(ItemFill { filled, extra: 0 });
			}
		};

		let query = self.token_query(request, item);
		let mut pushed = 0u64;
		let mut saw_candidate = false;
		let mut saw_non_self = false;
		for token in tokens {
			if pushed >= remaining {
				break;
			}
			// Flag state is re-checked when the synthetic item is processed;
			// a lookup failure here just lets the token through.
			if self.store.token_is_flagged(&token).await.unwrap_or(false) {
				debug!(%token, "skipping flagged token");
				continue;
			}
			let candidates = self
				.store
				.sell_orders_for_token(&token, &query)
				.await
				.unwrap_or_default();
			if !candidates.is_empty() {
				saw_candidate = true;
			}
			let usable = candidates.iter().any(|order| {
				order.maker != request.taker
					&& order.quantity_remaining.saturating_sub(ctx.filled(&order.id)) > 0
			});
			if !usable {
				continue;
			}
			saw_non_self = true;
			queue.push_back(WorkItem {
				request_index: work.request_index,
				item: RequestItem {
					token: Some(token),
					quantity: 1,
					fill_type: Some(FillType::Trade),
					preferred_order_source: item.preferred_order_source.clone(),
					..Default::default()
				},
			});
			pushed += 1;
		}

		if filled + pushed < want {
			let error = if filled == 0 && pushed == 0 && !saw_candidate {
				FillError::NoFillableOrders
			} else if filled == 0 && pushed == 0 && !saw_non_self {
				FillError::SelfFill
			} else {
				FillError::InsufficientQuantity {
					requested: want,
					available: filled + pushed,
				}
			};
			self.note_failure(partial, out, None, error)?;
		}
		Ok(ItemFill { filled, extra: 0 })
	}

	/// Takes up to `want` units from a collection's open mint stages.
	///
	/// Stage-level ineligibility is logged and skipped; only store failures
	/// surface as errors.
	async fn fill_from_mints(
		&self,
		request: &BuyRequest,
		collection: &str,
		token_filter: Option<U256>,
		want: u64,
		ctx: &mut FillContext,
		out: &mut BuiltPath,
	) -> Result<u64, FillError> {
		if want == 0 {
			return Ok(0);
		}
		let partial = request.options.partial;
		let order_id = mints::mint_order_id(collection);

		let stages = match self.store.open_mints(collection).await {
			Ok(stages) => stages,
			Err(e) => {
				self.note_failure(
					partial,
					out,
					Some(order_id.clone()),
					transient_store(order_id, e),
				)?;
				return Ok(0);
			}
		};
		if stages.is_empty() {
			return Ok(0);
		}
		let minted_before = match self.store.wallet_mint_count(collection, request.taker).await {
			Ok(count) => count,
			Err(e) => {
				self.note_failure(
					partial,
					out,
					Some(order_id.clone()),
					transient_store(order_id, e),
				)?;
				return Ok(0);
			}
		};

		let mut filled = 0u64;
		for stage in &stages {
			if filled >= want {
				break;
			}
			if token_filter.is_some() && stage.token_id != token_filter {
				continue;
			}
			let already = minted_before.saturating_add(ctx.filled(&order_id));
			match mints::wallet_capacity(stage, request.taker, already) {
				Ok(capacity) => {
					let take = capacity.min(want - filled);
					let detail = mints::mint_detail(stage, take);
					out.path.push(PathItem {
						order_id: order_id.clone(),
						kind: OrderKind::Mint,
						contract: stage.contract,
						token_id: stage.token_id,
						quantity: take,
						source: None,
						currency: stage.currency,
						currency_symbol: None,
						currency_decimals: None,
						raw_quote: detail.price,
						total_raw_price: detail.price,
						built_in_fees: vec![],
						fees_on_top: vec![],
						buy_in_currency: None,
						buy_in_raw_quote: None,
						gas_cost: None,
						origin_chain_id: None,
					});
					out.mints.push(detail);
					ctx.note_fill(&order_id, take);
					filled += take;
					debug!(collection, stage = %stage.stage, quantity = take, "added mint to path");
				}
				Err(reason) => {
					debug!(
						collection,
						stage = %stage.stage,
						reason = reason.as_str(),
						"mint stage not usable"
					);
				}
			}
		}
		Ok(filled)
	}

	/// The shared core: takes up to `want` units of one order, prices them
	/// and appends one path entry plus one listing detail.
	///
	/// The take is bounded by the order's remaining quantity net of this
	/// pass and, for orders with a real maker, by the maker's observed
	/// on-chain balance. Returns the units actually taken; zero means the
	/// order was silently exhausted or excluded.
	async fn add_to_path(
		&self,
		request: &BuyRequest,
		order: &NormalizedOrder,
		want: u64,
		token_id: Option<U256>,
		ctx: &mut FillContext,
		out: &mut BuiltPath,
		kinds: &mut HashMap<Address, ContractKind>,
	) -> Result<u64, FillError> {
		if order.maker == request.taker {
			return Err(FillError::SelfFill);
		}
		if request.options.exclude_order_ids.contains(&order.id) {
			return Ok(0);
		}

		let headroom = order.quantity_remaining.saturating_sub(ctx.filled(&order.id));
		let mut take = want.min(headroom);
		if take == 0 {
			return Ok(0);
		}

		let token_id = order.token_id.or(token_id);
		let contract_kind = self.contract_kind_for(order.contract, &order.id, kinds).await?;
		// The flag state rides on the detail record. A lookup failure leaves
		// the token unflagged instead of failing the fill.
		let flagged = match token_id {
			Some(token_id) => self
				.store
				.token_is_flagged(&TokenRef {
					contract: order.contract,
					token_id,
				})
				.await
				.unwrap_or(false),
			None => false,
		};

		// Pools custody their own inventory and Blur partials are trusted
		// from the payload; everything else is capped by what the maker
		// still holds.
		let tracked_asset = if !order.kind.is_pool() && order.kind != OrderKind::BlurPartial {
			match token_id {
				Some(token_id) => {
					let asset = MakerAsset {
						maker: order.maker,
						contract: order.contract,
						token_id,
					};
					let balance = match ctx.maker_balance(&asset) {
						Some(balance) => balance,
						None => {
							let balance = self
								.chain
								.nft_balance(contract_kind, order.contract, order.maker, token_id)
								.await
								.map_err(|e| FillError::TransientOrder {
									order_id: order.id.clone(),
									reason: format!("maker balance check failed: {e}"),
								})?;
							ctx.observe_maker_balance(asset, balance);
							balance
						}
					};
					if balance.is_zero() {
						return Err(FillError::UnrecoverableOrder {
							order_id: order.id.clone(),
							reason: "maker no longer holds the token".to_string(),
						});
					}
					take = balance.min(U256::from(take)).to::<u64>();
					Some(asset)
				}
				None => None,
			}
		} else {
			None
		};

		let (raw_quote, listing_price, listing_fees) = if order.kind.is_pool() {
			let pool: PoolOrderData =
				serde_json::from_value(order.raw_data.clone()).map_err(|e| {
					FillError::UnrecoverableOrder {
						order_id: order.id.clone(),
						reason: format!("malformed pool payload: {e}"),
					}
				})?;
			let key = pool_key(order.kind, pool.pool);
			let mut total = U256::ZERO;
			for _ in 0..take {
				let price = ctx.next_pool_price(&key, &pool.price_list).ok_or_else(|| {
					FillError::UnrecoverableOrder {
						order_id: order.id.clone(),
						reason: "pool has an empty price ladder".to_string(),
					}
				})?;
				total = total.saturating_add(price);
			}
			(total, total, vec![])
		} else {
			let unit = order.unit_price(request.options.normalize_royalties);
			let quote = unit.saturating_mul(U256::from(take));
			let fees: Vec<Fee> = if request.options.normalize_royalties {
				order
					.missing_royalties
					.iter()
					.filter(|fee| fee.recipient != Address::ZERO && !fee.amount.is_zero())
					.map(|fee| Fee {
						recipient: fee.recipient,
						amount: fee.amount.saturating_mul(U256::from(take)),
					})
					.collect()
			} else {
				vec![]
			};
			(quote, order.price.saturating_mul(U256::from(take)), fees)
		};

		let built_in_fees = order
			.fee_breakdown
			.iter()
			.map(|fee| BuiltInFee::from_breakdown(fee, raw_quote))
			.collect();

		out.path.push(PathItem {
			order_id: order.id.clone(),
			kind: order.kind,
			contract: order.contract,
			token_id,
			quantity: take,
			source: order.source.clone(),
			currency: order.currency,
			currency_symbol: None,
			currency_decimals: None,
			raw_quote,
			total_raw_price: raw_quote,
			built_in_fees,
			fees_on_top: vec![],
			buy_in_currency: None,
			buy_in_raw_quote: None,
			gas_cost: None,
			origin_chain_id: None,
		});
		out.listings.push(ListingDetail {
			order_id: order.id.clone(),
			kind: order.kind,
			contract: order.contract,
			contract_kind,
			token_id,
			quantity: take,
			flagged,
			maker: order.maker,
			source: order.source.clone(),
			currency: order.currency,
			price: listing_price,
			fees: listing_fees,
			raw_data: order.raw_data.clone(),
		});

		ctx.note_fill(&order.id, take);
		if let Some(asset) = tracked_asset {
			ctx.consume_maker_balance(&asset, take);
		}
		debug!(order_id = %order.id, kind = %order.kind, quantity = take, "added order to path");
		Ok(take)
	}

	/// Token standard of a contract, cached per pass. Contracts the store
	/// has never indexed are assumed ERC-721, which is what inline payloads
	/// overwhelmingly reference.
	async fn contract_kind_for(
		&self,
		contract: Address,
		order_id: &str,
		kinds: &mut HashMap<Address, ContractKind>,
	) -> Result<ContractKind, FillError> {
		if let Some(kind) = kinds.get(&contract) {
			return Ok(*kind);
		}
		let kind = match self.store.contract_kind(contract).await {
			Ok(kind) => kind,
			Err(StoreError::UnknownContract(_)) => {
				debug!(%contract, "contract unknown to the store, assuming erc721");
				ContractKind::Erc721
			}
			Err(e) => {
				return Err(FillError::TransientOrder {
					order_id: order_id.to_string(),
					reason: format!("contract kind unavailable: {e}"),
				})
			}
		};
		kinds.insert(contract, kind);
		Ok(kind)
	}

	fn token_query(&self, request: &BuyRequest, item: &RequestItem) -> TokenOrderQuery {
		TokenOrderQuery {
			taker: request.taker,
			exclude_order_ids: request.options.exclude_order_ids.clone(),
			normalize_royalties: request.options.normalize_royalties,
			limit: self.fill.max_candidates_per_token,
			preferred_source: item.preferred_order_source.clone(),
		}
	}

	/// Records an item- or order-scoped failure. Partial mode swallows
	/// everything except request validation failures; otherwise the error
	/// propagates and aborts the pass.
	fn note_failure(
		&self,
		partial: bool,
		out: &mut BuiltPath,
		order_id: Option<OrderId>,
		error: FillError,
	) -> Result<(), FillError> {
		if let Some(hook) = &self.hook {
			hook.on_order_error("path", order_id.as_deref(), &error);
		}
		out.errors.push(OrderError::from_error(order_id.clone(), &error));
		if partial && !matches!(error, FillError::Validation(_)) {
			debug!(order_id = ?order_id, error = %error, "skipping unfillable item");
			Ok(())
		} else {
			Err(error)
		}
	}
}

fn validate_request(request: &BuyRequest) -> Result<(), FillError> {
	if request.taker == Address::ZERO {
		return Err(FillError::Validation(
			"taker must be a non-zero address".to_string(),
		));
	}
	if request.items.is_empty() {
		return Err(FillError::Validation("request has no items".to_string()));
	}
	for (index, item) in request.items.iter().enumerate() {
		let targets = [
			item.token.is_some(),
			item.collection.is_some(),
			item.order_id.is_some(),
			item.raw_order.is_some(),
		]
		.iter()
		.filter(|set| **set)
		.count();
		if targets != 1 {
			return Err(FillError::Validation(format!(
				"item {index} must set exactly one of token, collection, orderId or rawOrder"
			)));
		}
		if item.quantity == 0 {
			return Err(FillError::Validation(format!(
				"item {index} has zero quantity"
			)));
		}
	}
	Ok(())
}

/// Why an order cannot be filled right now, if any reason applies.
fn fillability_issue(order: &NormalizedOrder) -> Option<String> {
	if order.quantity_remaining == 0 {
		return Some("no remaining quantity".to_string());
	}
	match order.status {
		OrderStatus::Active => {}
		OrderStatus::Inactive => return Some("order is inactive".to_string()),
		OrderStatus::Filled => return Some("order is already filled".to_string()),
		OrderStatus::Cancelled => return Some("order is cancelled".to_string()),
		OrderStatus::Expired => return Some("order is expired".to_string()),
	}
	if is_expired(order) {
		return Some("order is expired".to_string());
	}
	None
}

fn is_expired(order: &NormalizedOrder) -> bool {
	let now = chrono::Utc::now().timestamp().max(0) as u64;
	order.expiration.map_or(false, |expiration| expiration <= now)
}

fn classify_shortfall(requested: u64, filled: u64, stats: &WalkStats) -> FillError {
	if filled == 0 && stats.candidates == 0 {
		FillError::NoFillableOrders
	} else if filled == 0 && stats.self_skipped == stats.candidates {
		FillError::SelfFill
	} else {
		FillError::InsufficientQuantity {
			requested,
			available: filled,
		}
	}
}

fn transient_store(order_id: impl Into<OrderId>, error: StoreError) -> FillError {
	FillError::TransientOrder {
		order_id: order_id.into(),
		reason: error.to_string(),
	}
}

fn pool_order_from_raw(kind: OrderKind, data: &serde_json::Value) -> Result<NormalizedOrder, String> {
	let pool: PoolOrderData = serde_json::from_value(data.clone())
		.map_err(|e| format!("malformed pool payload: {e}"))?;
	if pool.price_list.is_empty() {
		return Err("pool payload has an empty price ladder".to_string());
	}
	Ok(NormalizedOrder {
		id: derived_order_id(kind, pool.pool, pool.token_id),
		kind,
		status: OrderStatus::Active,
		maker: pool.pool,
		taker: None,
		contract: pool.contract,
		token_id: pool.token_id,
		currency: pool.currency.unwrap_or(NATIVE_CURRENCY),
		price: pool.price_list[0],
		quantity_remaining: pool.quantity.unwrap_or(pool.price_list.len() as u64),
		source: None,
		fee_breakdown: vec![],
		missing_royalties: vec![],
		expiration: None,
		raw_data: data.clone(),
	})
}

fn blur_partial_order_from_raw(data: &serde_json::Value) -> Result<NormalizedOrder, String> {
	let blur: BlurPartialData = serde_json::from_value(data.clone())
		.map_err(|e| format!("malformed blur payload: {e}"))?;
	Ok(NormalizedOrder {
		id: derived_order_id(OrderKind::BlurPartial, blur.contract, Some(blur.token_id)),
		kind: OrderKind::BlurPartial,
		status: OrderStatus::Active,
		maker: Address::ZERO,
		taker: None,
		contract: blur.contract,
		token_id: Some(blur.token_id),
		currency: NATIVE_CURRENCY,
		price: blur.price,
		quantity_remaining: 1,
		source: blur.source.or_else(|| Some("blur.io".to_string())),
		fee_breakdown: vec![],
		missing_royalties: vec![],
		expiration: None,
		raw_data: data.clone(),
	})
}
