//! Execution planning.
//!
//! The router turns a priced path into the smallest set of transactions that
//! fills it. Most listings settle through per-protocol fill modules batched
//! into one multicall against the router contract; the exceptions are
//! exchanges that must be called directly by the taker, marketplaces that
//! only hand out calldata over HTTP, and open mints. Currency conversions
//! are planned as swap-module calls prepended to the same multicall, so a
//! taker paying in one currency can still clear listings priced in others.
//!
//! Planning is local: nothing here signs or submits. The output is a
//! [`FillOutput`] carrying ready-to-send transactions plus the approvals,
//! permits and off-chain signatures they depend on.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use aggregator_chain::ChainReader;
use aggregator_config::{AddressBook, ChainSettings, FillSettings};
use aggregator_pricing::CurrencyRegistry;
use aggregator_swap::{build_swap_execution, SwapDelivery, SwapQuote, SwapQuoter};
use aggregator_types::{
	is_native, ExecutionInfo, Fee, FillError, FillOptions, FillOutput, FillTx, ListingDetail,
	MintDetail, OnErrorHook, OrderError, OrderId, OrderKind, PreSignature, TxData,
};

pub mod adapters;
pub mod approvals;
pub mod calldata;
pub mod dedicated;
pub mod mints;

use adapters::{FillParams, ProtocolAdapter};
use calldata::{CalldataBatch, CalldataFetcher, CalldataItem};

sol! {
	/// One module call inside the router's multicall.
	struct Execution {
		address module;
		bytes data;
		uint256 value;
	}

	/// One ERC-20 leg the approval proxy pulls from the sender before the
	/// multicall runs.
	struct TokenTransfer {
		address recipient;
		uint256 amount;
	}

	interface IRouter {
		function execute(Execution[] executions) external payable;
	}

	interface IApprovalProxy {
		function transferAndMulticall(
			address token,
			TokenTransfer[] transfers,
			Execution[] executions
		) external payable;
	}
}

/// Failures raised while compiling module calls.
///
/// All of these are unrecoverable for the order they concern; the pipeline
/// maps them onto [`FillError`] entries and, in partial mode, drops the
/// offending order instead of failing the request.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
	/// The protocol has no fill route at all.
	#[error("no fill route for {0} orders")]
	Unsupported(OrderKind),
	/// The address book has no module under this name.
	#[error("no {0} module deployed")]
	MissingModule(&'static str),
	/// The address book has no exchange under this name.
	#[error("no {0} exchange deployed")]
	MissingExchange(&'static str),
	/// The stored order payload does not deserialize or lacks a required
	/// field.
	#[error("malformed order payload: {message}")]
	Payload { order_id: OrderId, message: String },
	/// The protocol cannot settle in the listing's currency.
	#[error("{kind} orders cannot settle in {currency}")]
	Currency { kind: OrderKind, currency: Address },
	/// The fill style cannot disburse on-top fees.
	#[error("{0} fills cannot carry on-top fees")]
	Fees(OrderKind),
}

impl RouterError {
	/// The order the failure is scoped to, when the error itself identifies
	/// one. Bucket-wide failures return `None` and taint every listing in
	/// the bucket.
	fn order_id(&self) -> Option<&OrderId> {
		match self {
			RouterError::Payload { order_id, .. } => Some(order_id),
			_ => None,
		}
	}
}

fn unrecoverable(order_id: &OrderId, error: &RouterError) -> FillError {
	FillError::UnrecoverableOrder {
		order_id: order_id.clone(),
		reason: error.to_string(),
	}
}

/// Marketplace domain assumed for fetched-calldata orders that carry no
/// source of their own.
fn default_source(kind: OrderKind) -> &'static str {
	match kind {
		OrderKind::Blur | OrderKind::BlurPartial => "blur.io",
		OrderKind::X2y2 => "x2y2.io",
		_ => "",
	}
}

/// Listings sharing one module call.
struct Bucket<'a> {
	adapter: &'static dyn ProtocolAdapter,
	module: Address,
	currency: Address,
	listings: Vec<&'a ListingDetail>,
}

/// An encoded bucket waiting for funding.
struct PlannedBucket {
	module: Address,
	currency: Address,
	execution: ExecutionInfo,
	order_ids: Vec<OrderId>,
	total: U256,
}

/// Compiles execution plans out of priced listings and mints.
pub struct Router {
	addresses: AddressBook,
	network: ChainSettings,
	fill: FillSettings,
	registry: Arc<CurrencyRegistry>,
	quoter: Arc<dyn SwapQuoter>,
	fetcher: Arc<dyn CalldataFetcher>,
	chain: Arc<dyn ChainReader>,
	hook: Option<Arc<dyn OnErrorHook>>,
}

impl Router {
	pub fn new(
		addresses: AddressBook,
		network: ChainSettings,
		fill: FillSettings,
		registry: Arc<CurrencyRegistry>,
		quoter: Arc<dyn SwapQuoter>,
		fetcher: Arc<dyn CalldataFetcher>,
		chain: Arc<dyn ChainReader>,
	) -> Self {
		Router {
			addresses,
			network,
			fill,
			registry,
			quoter,
			fetcher,
			chain,
			hook: None,
		}
	}

	/// Installs a hook notified of every order dropped during planning.
	pub fn with_hook(mut self, hook: Arc<dyn OnErrorHook>) -> Self {
		self.hook = Some(hook);
		self
	}

	/// Compiles fill transactions for `listings`.
	///
	/// Transactions come out in submission order: dedicated exchange fills,
	/// fetched-calldata fills, then the routed multicall with its swap
	/// executions in front. In partial mode unfillable orders are dropped
	/// and reported through [`FillOutput::errors`]; otherwise the first
	/// failure aborts the whole plan.
	pub async fn fill_listings_tx(
		&self,
		listings: &[ListingDetail],
		taker: Address,
		buy_in_currency: Address,
		options: &FillOptions,
	) -> Result<FillOutput, FillError> {
		let mut out = FillOutput::default();
		if listings.is_empty() {
			return Ok(out);
		}
		let partial = options.partial;
		let sender = options.relayer.unwrap_or(taker);
		debug!(
			listings = listings.len(),
			buy_in = %buy_in_currency,
			partial,
			"compiling execution plan"
		);

		let mut routed: Vec<&ListingDetail> = Vec::new();
		let mut fetched: BTreeMap<(&'static str, Address), Vec<&ListingDetail>> = BTreeMap::new();
		for listing in listings {
			if listing.kind.requires_dedicated_tx() {
				match dedicated::build_dedicated_tx(&self.addresses, listing, taker) {
					Ok(tx) => {
						out.record_outcome(&tx.order_ids, true);
						out.txs.push(tx);
					}
					Err(error) => {
						let failure = unrecoverable(&listing.order_id, &error);
						self.note_failure(&mut out, partial, &listing.order_id, failure)?;
					}
				}
			} else if listing.flagged && listing.kind.requires_offchain_auth() {
				// The marketplace behind the calldata service refuses flagged
				// tokens; failing here saves the round trip.
				let failure = FillError::UnrecoverableOrder {
					order_id: listing.order_id.clone(),
					reason: format!("flagged tokens cannot fill through {}", listing.kind),
				};
				self.note_failure(&mut out, partial, &listing.order_id, failure)?;
			} else if listing.kind.uses_fetched_calldata() {
				fetched
					.entry((listing.kind.as_str(), listing.contract))
					.or_default()
					.push(listing);
			} else {
				routed.push(listing);
			}
		}

		self.plan_fetched(&mut out, fetched, taker, options).await?;
		self.plan_direct(&mut out, &mut routed, taker, buy_in_currency, options);

		let params = FillParams {
			fill_to: taker,
			refund_to: sender,
			revert_if_incomplete: !partial,
		};
		let buckets = self.build_buckets(&mut out, &routed, partial)?;
		let mut planned: Vec<Option<PlannedBucket>> = self
			.encode_buckets(&mut out, buckets, &params, partial)?
			.into_iter()
			.map(Some)
			.collect();
		let (swap_executions, swap_pulls) = self
			.plan_swaps(&mut out, &mut planned, buy_in_currency, sender, partial)
			.await?;

		// Assemble the multicall. Swaps run first so every module is funded
		// by the time its call executes.
		let buy_in_native = is_native(buy_in_currency);
		let mut executions = swap_executions;
		let mut transfers: Vec<(Address, U256)> = Vec::new();
		let mut approvals = Vec::new();
		for (recipient, amount) in swap_pulls {
			approvals.push(approvals::approval_for(
				buy_in_currency,
				sender,
				self.addresses.approval_proxy,
				amount,
			));
			transfers.push((recipient, amount));
		}
		let mut order_ids: Vec<OrderId> = Vec::new();
		for bucket in planned.into_iter().flatten() {
			if !buy_in_native && bucket.currency == buy_in_currency {
				// No swap leg; the proxy pulls straight into the module.
				approvals.push(approvals::approval_for(
					buy_in_currency,
					sender,
					self.addresses.approval_proxy,
					bucket.total,
				));
				transfers.push((bucket.module, bucket.total));
			}
			order_ids.extend(bucket.order_ids);
			executions.push(bucket.execution);
		}

		if !executions.is_empty() {
			let value = executions
				.iter()
				.fold(U256::ZERO, |acc, execution| acc.saturating_add(execution.value));
			let calls: Vec<Execution> = executions
				.iter()
				.map(|execution| Execution {
					module: execution.module,
					data: execution.data.clone(),
					value: execution.value,
				})
				.collect();
			let (to, data) = if buy_in_native {
				(
					self.addresses.router,
					IRouter::executeCall { executions: calls }.abi_encode(),
				)
			} else {
				let transfers: Vec<TokenTransfer> = transfers
					.iter()
					.map(|&(recipient, amount)| TokenTransfer { recipient, amount })
					.collect();
				(
					self.addresses.approval_proxy,
					IApprovalProxy::transferAndMulticallCall {
						token: buy_in_currency,
						transfers,
						executions: calls,
					}
					.abi_encode(),
				)
			};

			let mut approvals = approvals::dedup_approvals(approvals);
			let mut permits = Vec::new();
			if options.use_permit && !approvals.is_empty() {
				// One permit covers the proxy's whole pull.
				let total = approvals
					.iter()
					.fold(U256::ZERO, |acc, approval| acc.saturating_add(approval.amount));
				match approvals::build_permit(
					self.chain.as_ref(),
					self.network.chain_id,
					buy_in_currency,
					sender,
					self.addresses.approval_proxy,
					total,
					self.fill.permit_deadline_secs,
				)
				.await
				{
					Ok(permit) => {
						approvals.clear();
						permits.push(permit);
					}
					Err(error) => {
						warn!(error = %error, "permit unavailable, keeping approval");
					}
				}
			}

			out.record_outcome(&order_ids, true);
			out.txs.push(FillTx {
				tx_data: TxData {
					from: sender,
					to,
					data: data.into(),
					value,
				},
				order_ids,
				approvals,
				permits,
			});
		}

		let needs_registration = listings.iter().any(|listing| {
			listing.kind.requires_auth_transaction()
				&& out.success.get(&listing.order_id).copied().unwrap_or(false)
		});
		if needs_registration {
			if let Some(exchange) = self.addresses.exchange("payment-processor") {
				out.auth_transactions
					.push(adapters::payment_processor::auth_transaction(exchange, taker));
			} else {
				warn!("payment-processor exchange not configured, skipping taker registration");
			}
		}

		info!(
			txs = out.txs.len(),
			errors = out.errors.len(),
			"compiled execution plan"
		);
		Ok(out)
	}

	/// Compiles mint transactions, one per mint.
	pub fn fill_mints_tx(
		&self,
		mints: &[MintDetail],
		taker: Address,
		options: &FillOptions,
	) -> Result<FillOutput, FillError> {
		let mut out = FillOutput::default();
		for mint in mints {
			match mints::build_mint_tx(mint, taker) {
				Ok(tx) => {
					out.record_outcome(&tx.order_ids, true);
					out.txs.push(tx);
				}
				Err(error) => {
					let order_id = mints::mint_order_id(mint);
					let failure = unrecoverable(&order_id, &error);
					self.note_failure(&mut out, options.partial, &order_id, failure)?;
				}
			}
		}
		Ok(out)
	}

	/// Resolves calldata for marketplaces that only release it over HTTP.
	/// One batch per `(protocol, contract)` pair; batches are fetched
	/// concurrently and each produces its own transaction.
	async fn plan_fetched(
		&self,
		out: &mut FillOutput,
		groups: BTreeMap<(&'static str, Address), Vec<&ListingDetail>>,
		taker: Address,
		options: &FillOptions,
	) -> Result<(), FillError> {
		if groups.is_empty() {
			return Ok(());
		}
		let mut batches = Vec::new();
		for ((_, contract), group) in groups {
			let kind = group[0].kind;
			let source = group[0]
				.source
				.clone()
				.unwrap_or_else(|| default_source(kind).to_string());
			let auth = options.auth_tokens.get(&source).cloned();
			if kind.requires_offchain_auth() && auth.is_none() {
				for listing in &group {
					let failure = FillError::TransientOrder {
						order_id: listing.order_id.clone(),
						reason: format!("missing {source} authentication"),
					};
					self.note_failure(out, options.partial, &listing.order_id, failure)?;
				}
				continue;
			}
			let items = group
				.iter()
				.map(|listing| CalldataItem {
					order_id: listing.order_id.clone(),
					token_id: listing.token_id,
					price: listing.price,
					quantity: listing.quantity,
					raw_data: listing.raw_data.clone(),
				})
				.collect();
			batches.push(CalldataBatch {
				kind,
				contract,
				taker,
				auth,
				items,
			});
		}

		let results = join_all(batches.iter().map(|batch| self.fetcher.fetch_batch(batch))).await;
		for (batch, result) in batches.iter().zip(results) {
			let ids: Vec<OrderId> = batch.items.iter().map(|item| item.order_id.clone()).collect();
			match result {
				Ok(filled) => {
					if let Some(message) = filled.pre_sign {
						out.pre_signatures.push(PreSignature {
							order_ids: ids.clone(),
							message,
						});
					}
					out.record_outcome(&ids, true);
					out.txs.push(FillTx {
						tx_data: filled.tx_data,
						order_ids: ids,
						approvals: Vec::new(),
						permits: Vec::new(),
					});
				}
				Err(error) => {
					for order_id in &ids {
						let failure = if error.is_unrecoverable() {
							FillError::UnrecoverableOrder {
								order_id: order_id.clone(),
								reason: error.to_string(),
							}
						} else {
							FillError::TransientOrder {
								order_id: order_id.clone(),
								reason: error.to_string(),
							}
						};
						self.note_failure(out, options.partial, order_id, failure)?;
					}
				}
			}
		}
		Ok(())
	}

	/// Fills straight against the exchange when the whole routed set is one
	/// Seaport-family protocol paying native with no fees involved. Skipped
	/// whenever any plan feature needs the router in the loop.
	fn plan_direct(
		&self,
		out: &mut FillOutput,
		routed: &mut Vec<&ListingDetail>,
		taker: Address,
		buy_in: Address,
		options: &FillOptions,
	) {
		if routed.is_empty()
			|| options.force_router
			|| options.use_permit
			|| options.relayer.is_some()
			|| !options.fees_on_top.is_empty()
		{
			return;
		}
		let first = routed[0];
		let eligible = is_native(buy_in)
			&& first.kind.is_seaport_family()
			&& routed.iter().all(|listing| {
				listing.kind == first.kind
					&& listing.currency == buy_in
					&& listing.fees.is_empty()
			});
		if !eligible {
			return;
		}
		let Some(exchange) = self.addresses.exchange(first.kind.as_str()) else {
			return;
		};
		let Some(tx_data) = adapters::seaport::attempt_direct_fill(exchange, routed.as_slice(), taker)
		else {
			return;
		};
		let order_ids: Vec<OrderId> = routed
			.iter()
			.map(|listing| listing.order_id.clone())
			.collect();
		debug!(orders = order_ids.len(), exchange = %exchange, "direct exchange fill");
		out.record_outcome(&order_ids, true);
		out.txs.push(FillTx {
			tx_data,
			order_ids,
			approvals: Vec::new(),
			permits: Vec::new(),
		});
		routed.clear();
	}

	/// Groups routed listings by fill module and settlement currency.
	fn build_buckets<'a>(
		&self,
		out: &mut FillOutput,
		routed: &[&'a ListingDetail],
		partial: bool,
	) -> Result<Vec<Bucket<'a>>, FillError> {
		let mut map: BTreeMap<(&'static str, Address), Bucket<'a>> = BTreeMap::new();
		for &listing in routed {
			let Some(adapter) = adapters::adapter_for(listing.kind) else {
				let error = RouterError::Unsupported(listing.kind);
				let failure = unrecoverable(&listing.order_id, &error);
				self.note_failure(out, partial, &listing.order_id, failure)?;
				continue;
			};
			if !is_native(listing.currency) && !adapter.supports_erc20() {
				let error = RouterError::Currency {
					kind: listing.kind,
					currency: listing.currency,
				};
				let failure = unrecoverable(&listing.order_id, &error);
				self.note_failure(out, partial, &listing.order_id, failure)?;
				continue;
			}
			let name = adapter.module_name(listing.kind);
			let Some(module) = self.addresses.module(name) else {
				let error = RouterError::MissingModule(name);
				let failure = unrecoverable(&listing.order_id, &error);
				self.note_failure(out, partial, &listing.order_id, failure)?;
				continue;
			};
			map.entry((adapter.bucket_name(listing.kind), listing.currency))
				.or_insert_with(|| Bucket {
					adapter,
					module,
					currency: listing.currency,
					listings: Vec::new(),
				})
				.listings
				.push(listing);
		}
		Ok(map.into_values().collect())
	}

	/// Encodes one module call per bucket. A payload failure drops just the
	/// offending listing and re-encodes the rest; any other failure taints
	/// the whole bucket.
	fn encode_buckets(
		&self,
		out: &mut FillOutput,
		buckets: Vec<Bucket<'_>>,
		params: &FillParams,
		partial: bool,
	) -> Result<Vec<PlannedBucket>, FillError> {
		let mut planned = Vec::with_capacity(buckets.len());
		for mut bucket in buckets {
			loop {
				if bucket.listings.is_empty() {
					break;
				}
				// Zero-amount or zero-recipient fees are dropped before use.
				let fees: Vec<Fee> = bucket
					.listings
					.iter()
					.flat_map(|listing| listing.fees.iter())
					.filter(|fee| fee.recipient != Address::ZERO && !fee.amount.is_zero())
					.cloned()
					.collect();
				match bucket
					.adapter
					.build_fill(bucket.module, &bucket.listings, &fees, params)
				{
					Ok(execution) => {
						planned.push(PlannedBucket {
							module: bucket.module,
							currency: bucket.currency,
							order_ids: bucket
								.listings
								.iter()
								.map(|listing| listing.order_id.clone())
								.collect(),
							total: adapters::bucket_total(&bucket.listings),
							execution,
						});
						break;
					}
					Err(error) => {
						if let Some(order_id) = error.order_id().cloned() {
							let failure = unrecoverable(&order_id, &error);
							self.note_failure(out, partial, &order_id, failure)?;
							bucket.listings.retain(|listing| listing.order_id != order_id);
						} else {
							for listing in &bucket.listings {
								let failure = unrecoverable(&listing.order_id, &error);
								self.note_failure(out, partial, &listing.order_id, failure)?;
							}
							break;
						}
					}
				}
			}
		}
		Ok(planned)
	}

	/// Quotes and encodes the swaps funding buckets whose currency differs
	/// from the buy-in. Returns the swap executions plus the ERC-20 pulls
	/// the approval proxy must perform for them. Buckets funded by a swap
	/// have their call value zeroed; buckets whose pair cannot be quoted
	/// are dropped.
	async fn plan_swaps(
		&self,
		out: &mut FillOutput,
		planned: &mut [Option<PlannedBucket>],
		buy_in: Address,
		refund_to: Address,
		partial: bool,
	) -> Result<(Vec<ExecutionInfo>, Vec<(Address, U256)>), FillError> {
		let token_in = self.registry.normalize_for_pools(buy_in);
		let mut pairs: BTreeMap<Address, Vec<usize>> = BTreeMap::new();
		for (index, bucket) in planned.iter().enumerate() {
			let Some(bucket) = bucket else { continue };
			if bucket.currency == buy_in {
				continue;
			}
			pairs
				.entry(self.registry.normalize_for_pools(bucket.currency))
				.or_default()
				.push(index);
		}
		if pairs.is_empty() {
			return Ok((Vec::new(), Vec::new()));
		}

		let demands: Vec<(Address, Vec<usize>, U256)> = pairs
			.into_iter()
			.map(|(token_out, indices)| {
				let total = indices.iter().fold(U256::ZERO, |acc, &index| {
					acc.saturating_add(
						planned[index]
							.as_ref()
							.map(|bucket| bucket.total)
							.unwrap_or_default(),
					)
				});
				(token_out, indices, total)
			})
			.collect();

		let quotes = join_all(demands.iter().map(|&(token_out, _, total)| async move {
			if token_out == token_in {
				// Same pool unit; the module wraps or unwraps one-to-one.
				Ok(SwapQuote {
					amount_in: total,
					router_calldata: Bytes::new(),
				})
			} else {
				self.quoter.quote_exact_output(token_in, token_out, total).await
			}
		}))
		.await;

		let buy_in_native = is_native(buy_in);
		let mut swap_executions = Vec::new();
		let mut pulls = Vec::new();
		for ((_, indices, _), quote) in demands.into_iter().zip(quotes) {
			match quote {
				Ok(quote) => {
					let deliveries: Vec<SwapDelivery> = indices
						.iter()
						.filter_map(|&index| {
							planned[index].as_ref().map(|bucket| SwapDelivery {
								recipient: bucket.module,
								amount: bucket.total,
								to_native: is_native(bucket.currency),
							})
						})
						.collect();
					let swap = build_swap_execution(
						self.addresses.swap_module,
						buy_in,
						buy_in_native,
						&quote,
						deliveries,
						refund_to,
					);
					if !buy_in_native {
						pulls.push((swap.to, swap.amount_in));
					}
					swap_executions.push(ExecutionInfo {
						module: swap.to,
						data: swap.data,
						value: swap.value,
					});
					for &index in &indices {
						if let Some(bucket) = planned[index].as_mut() {
							// Funded by the swap delivery, not by call value.
							bucket.execution.value = U256::ZERO;
						}
					}
				}
				Err(error) => {
					debug!(error = %error, "swap quote failed, dropping dependent buckets");
					for &index in &indices {
						let Some(bucket) = planned[index].take() else {
							continue;
						};
						let failure = FillError::SwapUnavailable {
							from: buy_in,
							to: bucket.currency,
						};
						for order_id in &bucket.order_ids {
							self.note_failure(out, partial, order_id, failure.clone())?;
						}
					}
				}
			}
		}
		Ok((swap_executions, pulls))
	}

	/// Records a dropped order. In partial mode the error lands in the
	/// output and planning continues; otherwise it aborts the plan.
	fn note_failure(
		&self,
		out: &mut FillOutput,
		partial: bool,
		order_id: &OrderId,
		error: FillError,
	) -> Result<(), FillError> {
		if let Some(hook) = &self.hook {
			hook.on_order_error("router", Some(order_id.as_str()), &error);
		}
		out.record_outcome(std::slice::from_ref(order_id), false);
		out.errors.push(OrderError::from_error(Some(order_id.clone()), &error));
		if partial && !matches!(error, FillError::Validation(_)) {
			debug!(order_id = %order_id, error = %error, "dropping order from plan");
			Ok(())
		} else {
			Err(error)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::adapters::{ISeaportExchange, ISeaportModule};
	use crate::calldata::{FetchError, FetchedBatch};
	use aggregator_chain::implementations::static_chain::StaticChainReader;
	use aggregator_chain::ChainError;
	use aggregator_swap::implementations::fixed::{FixedSwapConfig, FixedSwapQuoter, RouteEntry};
	use aggregator_swap::{ISwapModule, SwapError};
	use aggregator_types::{
		ContractKind, Currency, MintCalldataTemplate, MintParam, MintParamKind, MintTxTemplate,
		NATIVE_CURRENCY,
	};
	use alloy_sol_types::SolValue;
	use async_trait::async_trait;
	use serde_json::json;
	use std::collections::HashMap;
	use std::sync::Mutex;

	fn usdc() -> Address {
		Address::repeat_byte(0x55)
	}

	fn taker() -> Address {
		Address::repeat_byte(0x77)
	}

	fn listing(id: &str, kind: OrderKind, price: u64) -> ListingDetail {
		ListingDetail {
			order_id: id.to_string(),
			kind,
			contract: Address::repeat_byte(0x11),
			contract_kind: ContractKind::Erc721,
			token_id: Some(U256::from(7)),
			quantity: 1,
			flagged: false,
			maker: Address::repeat_byte(0x22),
			source: None,
			currency: NATIVE_CURRENCY,
			price: U256::from(price),
			fees: Vec::new(),
			raw_data: serde_json::Value::Null,
		}
	}

	fn test_registry() -> Arc<CurrencyRegistry> {
		let book = AddressBook::default();
		Arc::new(CurrencyRegistry::new(
			vec![
				Currency {
					contract: NATIVE_CURRENCY,
					symbol: "ETH".to_string(),
					decimals: 18,
				},
				Currency {
					contract: book.wrapped_native,
					symbol: "WETH".to_string(),
					decimals: 18,
				},
				Currency {
					contract: usdc(),
					symbol: "USDC".to_string(),
					decimals: 6,
				},
			],
			book.wrapped_native,
		))
	}

	/// Quoter with one WETH/USDC route at two USDC per WETH, no slippage.
	fn test_quoter() -> Arc<FixedSwapQuoter> {
		let book = AddressBook::default();
		Arc::new(FixedSwapQuoter::new(FixedSwapConfig {
			routes: vec![RouteEntry {
				token_in: book.wrapped_native,
				token_out: usdc(),
				numerator: U256::from(1),
				denominator: U256::from(2),
				fee_tier: 3000,
				slippage_bps: 0,
			}],
			recipient: Some(book.swap_module),
		}))
	}

	#[derive(Default)]
	struct StubFetcher {
		fills: HashMap<Address, FetchedBatch>,
		failures: HashMap<Address, FetchError>,
		seen: Mutex<Vec<CalldataBatch>>,
	}

	#[async_trait]
	impl CalldataFetcher for StubFetcher {
		async fn fetch_batch(&self, batch: &CalldataBatch) -> Result<FetchedBatch, FetchError> {
			self.seen.lock().unwrap().push(batch.clone());
			if let Some(error) = self.failures.get(&batch.contract) {
				return Err(error.clone());
			}
			self.fills
				.get(&batch.contract)
				.cloned()
				.ok_or_else(|| FetchError::Transient("no stub response".to_string()))
		}
	}

	struct NoRouteQuoter;

	#[async_trait]
	impl SwapQuoter for NoRouteQuoter {
		async fn quote_exact_output(
			&self,
			token_in: Address,
			token_out: Address,
			_amount_out: U256,
		) -> Result<SwapQuote, SwapError> {
			Err(SwapError::NoRoute {
				from: token_in,
				to: token_out,
			})
		}
	}

	sol! {
		function nonces(address owner) external view returns (uint256);
		function name() external view returns (string);
	}

	/// Chain stub answering the EIP-2612 domain reads permits need.
	struct Erc2612Reader;

	#[async_trait]
	impl ChainReader for Erc2612Reader {
		async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes, ChainError> {
			if data.starts_with(&noncesCall::SELECTOR) {
				Ok(U256::from(5).abi_encode().into())
			} else if data.starts_with(&nameCall::SELECTOR) {
				Ok("Test Coin".to_string().abi_encode().into())
			} else {
				Err(ChainError::Unsupported("call"))
			}
		}

		async fn native_balance(&self, _owner: Address) -> Result<U256, ChainError> {
			Err(ChainError::Unsupported("native_balance"))
		}
	}

	fn test_router() -> Router {
		router_with(Arc::new(StubFetcher::default()), test_quoter())
	}

	fn router_with(fetcher: Arc<dyn CalldataFetcher>, quoter: Arc<dyn SwapQuoter>) -> Router {
		Router::new(
			AddressBook::default(),
			ChainSettings::default(),
			FillSettings::default(),
			test_registry(),
			quoter,
			fetcher,
			Arc::new(StaticChainReader::new()),
		)
	}

	fn router_with_chain(chain: Arc<dyn ChainReader>) -> Router {
		Router::new(
			AddressBook::default(),
			ChainSettings::default(),
			FillSettings::default(),
			test_registry(),
			test_quoter(),
			Arc::new(StubFetcher::default()),
			chain,
		)
	}

	fn book() -> AddressBook {
		AddressBook::default()
	}

	#[tokio::test]
	async fn test_single_seaport_listing_fills_direct() {
		let router = test_router();
		let listings = vec![listing("a", OrderKind::SeaportV15, 1_000)];
		let out = router
			.fill_listings_tx(&listings, taker(), NATIVE_CURRENCY, &FillOptions::default())
			.await
			.unwrap();

		assert_eq!(out.txs.len(), 1);
		let tx = &out.txs[0];
		assert_eq!(tx.tx_data.to, book().exchange("seaport-v1.5").unwrap());
		assert_eq!(tx.tx_data.from, taker());
		assert_eq!(tx.tx_data.value, U256::from(1_000));
		let call = ISeaportExchange::fulfillAdvancedOrderCall::abi_decode(&tx.tx_data.data).unwrap();
		assert_eq!(call.recipient, taker());
		assert_eq!(out.success.get("a"), Some(&true));
	}

	#[tokio::test]
	async fn test_batched_direct_fill_uses_fulfill_available() {
		let router = test_router();
		let listings = vec![
			listing("a", OrderKind::SeaportV15, 1_000),
			listing("b", OrderKind::SeaportV15, 2_500),
		];
		let out = router
			.fill_listings_tx(&listings, taker(), NATIVE_CURRENCY, &FillOptions::default())
			.await
			.unwrap();

		assert_eq!(out.txs.len(), 1);
		let tx = &out.txs[0];
		assert_eq!(tx.tx_data.to, book().exchange("seaport-v1.5").unwrap());
		assert_eq!(tx.tx_data.value, U256::from(3_500));
		let call =
			ISeaportExchange::fulfillAvailableAdvancedOrdersCall::abi_decode(&tx.tx_data.data)
				.unwrap();
		assert_eq!(call.advancedOrders.len(), 2);
		assert_eq!(call.maximumFulfilled, U256::from(2));
		assert_eq!(call.recipient, taker());
	}

	#[tokio::test]
	async fn test_force_router_goes_through_module() {
		let router = test_router();
		let listings = vec![listing("a", OrderKind::SeaportV15, 1_000)];
		let options = FillOptions {
			force_router: true,
			..Default::default()
		};
		let out = router
			.fill_listings_tx(&listings, taker(), NATIVE_CURRENCY, &options)
			.await
			.unwrap();

		assert_eq!(out.txs.len(), 1);
		let tx = &out.txs[0];
		assert_eq!(tx.tx_data.to, book().router);
		assert_eq!(tx.tx_data.value, U256::from(1_000));
		let call = IRouter::executeCall::abi_decode(&tx.tx_data.data).unwrap();
		assert_eq!(call.executions.len(), 1);
		assert_eq!(call.executions[0].module, book().module("seaport-v1.5").unwrap());
		assert_eq!(call.executions[0].value, U256::from(1_000));
	}

	#[tokio::test]
	async fn test_global_fees_disable_direct_fill() {
		let router = test_router();
		let listings = vec![listing("a", OrderKind::SeaportV15, 1_000)];
		let options = FillOptions {
			fees_on_top: vec![Fee {
				recipient: Address::repeat_byte(0x99),
				amount: U256::from(50),
			}],
			..Default::default()
		};
		let out = router
			.fill_listings_tx(&listings, taker(), NATIVE_CURRENCY, &options)
			.await
			.unwrap();

		assert_eq!(out.txs.len(), 1);
		assert_eq!(out.txs[0].tx_data.to, book().router);
	}

	#[tokio::test]
	async fn test_attached_fees_encoded_in_module_call() {
		let router = test_router();
		let mut fee_listing = listing("a", OrderKind::SeaportV15, 1_000);
		fee_listing.fees = vec![Fee {
			recipient: Address::repeat_byte(0x99),
			amount: U256::from(30),
		}];
		let out = router
			.fill_listings_tx(&[fee_listing], taker(), NATIVE_CURRENCY, &FillOptions::default())
			.await
			.unwrap();

		// Attached fees rule out the direct path.
		let tx = &out.txs[0];
		assert_eq!(tx.tx_data.to, book().router);
		assert_eq!(tx.tx_data.value, U256::from(1_030));
		let call = IRouter::executeCall::abi_decode(&tx.tx_data.data).unwrap();
		let module_call =
			ISeaportModule::acceptETHListingsCall::abi_decode(&call.executions[0].data).unwrap();
		assert_eq!(module_call.fees.len(), 1);
		assert_eq!(module_call.fees[0].recipient, Address::repeat_byte(0x99));
		assert_eq!(module_call.fees[0].amount, U256::from(30));
	}

	#[tokio::test]
	async fn test_mixed_versions_bucket_separately() {
		let router = test_router();
		let listings = vec![
			listing("a", OrderKind::SeaportV15, 1_000),
			listing("b", OrderKind::SeaportV14, 2_000),
			listing("c", OrderKind::SeaportV15, 3_000),
		];
		let out = router
			.fill_listings_tx(&listings, taker(), NATIVE_CURRENCY, &FillOptions::default())
			.await
			.unwrap();

		assert_eq!(out.txs.len(), 1);
		let call = IRouter::executeCall::abi_decode(&out.txs[0].tx_data.data).unwrap();
		assert_eq!(call.executions.len(), 2);
		assert_eq!(call.executions[0].module, book().module("seaport-v1.4").unwrap());
		assert_eq!(call.executions[0].value, U256::from(2_000));
		assert_eq!(call.executions[1].module, book().module("seaport-v1.5").unwrap());
		assert_eq!(call.executions[1].value, U256::from(4_000));
		assert_eq!(out.txs[0].tx_data.value, U256::from(6_000));
	}

	#[tokio::test]
	async fn test_erc20_listing_native_buy_in_prepends_swap() {
		let router = test_router();
		let mut erc20_listing = listing("a", OrderKind::SeaportV15, 1_000);
		erc20_listing.currency = usdc();
		let out = router
			.fill_listings_tx(&[erc20_listing], taker(), NATIVE_CURRENCY, &FillOptions::default())
			.await
			.unwrap();

		assert_eq!(out.txs.len(), 1);
		let tx = &out.txs[0];
		assert_eq!(tx.tx_data.to, book().router);
		// Two USDC per WETH: 1000 out costs 500 in.
		assert_eq!(tx.tx_data.value, U256::from(500));
		let call = IRouter::executeCall::abi_decode(&tx.tx_data.data).unwrap();
		assert_eq!(call.executions.len(), 2);
		assert_eq!(call.executions[0].module, book().swap_module);
		assert_eq!(call.executions[0].value, U256::from(500));
		let swap_call =
			ISwapModule::ethToExactOutputCall::abi_decode(&call.executions[0].data).unwrap();
		assert_eq!(swap_call.transfers.len(), 1);
		assert_eq!(swap_call.transfers[0].recipient, book().module("seaport-v1.5").unwrap());
		assert_eq!(swap_call.transfers[0].amount, U256::from(1_000));
		assert!(!swap_call.transfers[0].toNative);
		// The bucket is funded by the delivery, not by call value.
		assert_eq!(call.executions[1].value, U256::ZERO);
	}

	#[tokio::test]
	async fn test_wrapped_listing_native_buy_in_wraps_without_route() {
		let router = test_router();
		let mut weth_listing = listing("a", OrderKind::SeaportV15, 800);
		weth_listing.currency = book().wrapped_native;
		let out = router
			.fill_listings_tx(&[weth_listing], taker(), NATIVE_CURRENCY, &FillOptions::default())
			.await
			.unwrap();

		let call = IRouter::executeCall::abi_decode(&out.txs[0].tx_data.data).unwrap();
		assert_eq!(call.executions[0].module, book().swap_module);
		assert_eq!(call.executions[0].value, U256::from(800));
		let swap_call =
			ISwapModule::ethToExactOutputCall::abi_decode(&call.executions[0].data).unwrap();
		// One-to-one wrap; no DEX involved.
		assert!(swap_call.swapData.is_empty());
		assert_eq!(swap_call.transfers[0].amount, U256::from(800));
		assert_eq!(out.txs[0].tx_data.value, U256::from(800));
	}

	#[tokio::test]
	async fn test_swap_failure_partial_keeps_native_orders() {
		let router = router_with(Arc::new(StubFetcher::default()), Arc::new(NoRouteQuoter));
		let mut erc20_listing = listing("b", OrderKind::SeaportV15, 1_000);
		erc20_listing.currency = usdc();
		let listings = vec![listing("a", OrderKind::SeaportV15, 100), erc20_listing];
		let options = FillOptions {
			partial: true,
			..Default::default()
		};
		let out = router
			.fill_listings_tx(&listings, taker(), NATIVE_CURRENCY, &options)
			.await
			.unwrap();

		assert_eq!(out.success.get("a"), Some(&true));
		assert_eq!(out.success.get("b"), Some(&false));
		assert_eq!(out.errors.len(), 1);
		assert_eq!(out.errors[0].order_id.as_deref(), Some("b"));
		assert!(out.errors[0].message.contains("no conversion route"));
		assert_eq!(out.txs.len(), 1);
		let call = IRouter::executeCall::abi_decode(&out.txs[0].tx_data.data).unwrap();
		assert_eq!(call.executions.len(), 1);
	}

	#[tokio::test]
	async fn test_swap_failure_strict_aborts() {
		let router = router_with(Arc::new(StubFetcher::default()), Arc::new(NoRouteQuoter));
		let mut erc20_listing = listing("a", OrderKind::SeaportV15, 1_000);
		erc20_listing.currency = usdc();
		let result = router
			.fill_listings_tx(&[erc20_listing], taker(), NATIVE_CURRENCY, &FillOptions::default())
			.await;
		assert!(matches!(result, Err(FillError::SwapUnavailable { .. })));
	}

	#[tokio::test]
	async fn test_erc20_buy_in_routes_through_proxy() {
		let router = test_router();
		let mut erc20_listing = listing("a", OrderKind::SeaportV15, 1_000);
		erc20_listing.currency = usdc();
		let out = router
			.fill_listings_tx(&[erc20_listing], taker(), usdc(), &FillOptions::default())
			.await
			.unwrap();

		assert_eq!(out.txs.len(), 1);
		let tx = &out.txs[0];
		assert_eq!(tx.tx_data.to, book().approval_proxy);
		assert_eq!(tx.tx_data.value, U256::ZERO);
		let call = IApprovalProxy::transferAndMulticallCall::abi_decode(&tx.tx_data.data).unwrap();
		assert_eq!(call.token, usdc());
		assert_eq!(call.transfers.len(), 1);
		assert_eq!(call.transfers[0].recipient, book().module("seaport-v1.5").unwrap());
		assert_eq!(call.transfers[0].amount, U256::from(1_000));
		assert_eq!(call.executions.len(), 1);
		assert_eq!(call.executions[0].value, U256::ZERO);
		assert_eq!(tx.approvals.len(), 1);
		assert_eq!(tx.approvals[0].operator, book().approval_proxy);
		assert_eq!(tx.approvals[0].amount, U256::from(1_000));
	}

	#[tokio::test]
	async fn test_erc20_buy_in_with_swap_merges_approvals() {
		let router = test_router();
		let weth = book().wrapped_native;
		let mut usdc_listing = listing("a", OrderKind::SeaportV15, 1_000);
		usdc_listing.currency = usdc();
		let mut weth_listing = listing("b", OrderKind::SeaportV15, 200);
		weth_listing.currency = weth;
		let out = router
			.fill_listings_tx(&[usdc_listing, weth_listing], taker(), weth, &FillOptions::default())
			.await
			.unwrap();

		assert_eq!(out.txs.len(), 1);
		let tx = &out.txs[0];
		assert_eq!(tx.tx_data.to, book().approval_proxy);
		let call = IApprovalProxy::transferAndMulticallCall::abi_decode(&tx.tx_data.data).unwrap();
		assert_eq!(call.token, weth);
		// Swap pull first, then the direct module pull.
		assert_eq!(call.transfers.len(), 2);
		assert_eq!(call.transfers[0].recipient, book().swap_module);
		assert_eq!(call.transfers[0].amount, U256::from(500));
		assert_eq!(call.transfers[1].recipient, book().module("seaport-v1.5").unwrap());
		assert_eq!(call.transfers[1].amount, U256::from(200));
		assert_eq!(call.executions.len(), 3);
		assert_eq!(call.executions[0].module, book().swap_module);
		// One merged approval covering both pulls.
		assert_eq!(tx.approvals.len(), 1);
		assert_eq!(tx.approvals[0].amount, U256::from(700));
		assert_eq!(tx.approvals[0].currency, weth);
	}

	#[tokio::test]
	async fn test_use_permit_replaces_approvals() {
		let router = router_with_chain(Arc::new(Erc2612Reader));
		let mut erc20_listing = listing("a", OrderKind::SeaportV15, 1_000);
		erc20_listing.currency = usdc();
		let options = FillOptions {
			use_permit: true,
			..Default::default()
		};
		let out = router
			.fill_listings_tx(&[erc20_listing], taker(), usdc(), &options)
			.await
			.unwrap();

		let tx = &out.txs[0];
		assert!(tx.approvals.is_empty());
		assert_eq!(tx.permits.len(), 1);
		assert_eq!(tx.permits[0].spender, book().approval_proxy);
		assert_eq!(tx.permits[0].amount, U256::from(1_000));
		assert_eq!(tx.permits[0].typed_data["message"]["nonce"], "5");
	}

	#[tokio::test]
	async fn test_permit_falls_back_to_approval() {
		// StaticChainReader rejects raw calls, so the nonce read fails.
		let router = test_router();
		let mut erc20_listing = listing("a", OrderKind::SeaportV15, 1_000);
		erc20_listing.currency = usdc();
		let options = FillOptions {
			use_permit: true,
			..Default::default()
		};
		let out = router
			.fill_listings_tx(&[erc20_listing], taker(), usdc(), &options)
			.await
			.unwrap();

		let tx = &out.txs[0];
		assert!(tx.permits.is_empty());
		assert_eq!(tx.approvals.len(), 1);
	}

	#[tokio::test]
	async fn test_revert_flag_tracks_partial_mode() {
		let router = test_router();
		let options = FillOptions {
			force_router: true,
			..Default::default()
		};
		let decode_revert_flag = |out: &FillOutput| {
			let call = IRouter::executeCall::abi_decode(&out.txs[0].tx_data.data).unwrap();
			let module_call =
				ISeaportModule::acceptETHListingsCall::abi_decode(&call.executions[0].data)
					.unwrap();
			module_call.params.revertIfIncomplete
		};

		let strict = router
			.fill_listings_tx(
				&[listing("a", OrderKind::SeaportV15, 100)],
				taker(),
				NATIVE_CURRENCY,
				&options,
			)
			.await
			.unwrap();
		assert!(decode_revert_flag(&strict));

		let partial = router
			.fill_listings_tx(
				&[listing("a", OrderKind::SeaportV15, 100)],
				taker(),
				NATIVE_CURRENCY,
				&FillOptions {
					partial: true,
					force_router: true,
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert!(!decode_revert_flag(&partial));
	}

	#[tokio::test]
	async fn test_relayer_becomes_sender_and_refund_target() {
		let router = test_router();
		let relayer = Address::repeat_byte(0x88);
		let options = FillOptions {
			relayer: Some(relayer),
			..Default::default()
		};
		let out = router
			.fill_listings_tx(
				&[listing("a", OrderKind::SeaportV15, 100)],
				taker(),
				NATIVE_CURRENCY,
				&options,
			)
			.await
			.unwrap();

		// A relayer rules out the direct path; the router tx is sent by it.
		let tx = &out.txs[0];
		assert_eq!(tx.tx_data.to, book().router);
		assert_eq!(tx.tx_data.from, relayer);
		let call = IRouter::executeCall::abi_decode(&tx.tx_data.data).unwrap();
		let module_call =
			ISeaportModule::acceptETHListingsCall::abi_decode(&call.executions[0].data).unwrap();
		assert_eq!(module_call.params.fillTo, taker());
		assert_eq!(module_call.params.refundTo, relayer);
	}

	#[tokio::test]
	async fn test_payment_processor_fill_adds_registration() {
		let router = test_router();
		let listings = vec![listing("a", OrderKind::PaymentProcessor, 500)];
		let out = router
			.fill_listings_tx(&listings, taker(), NATIVE_CURRENCY, &FillOptions::default())
			.await
			.unwrap();

		assert_eq!(out.txs.len(), 1);
		assert_eq!(out.txs[0].tx_data.to, book().router);
		assert_eq!(out.auth_transactions.len(), 1);
		assert_eq!(out.auth_transactions[0].to, book().exchange("payment-processor").unwrap());
		assert_eq!(out.auth_transactions[0].from, taker());
	}

	#[tokio::test]
	async fn test_mint_kind_listing_is_unsupported() {
		let router = test_router();
		let listings = vec![listing("a", OrderKind::Mint, 100)];

		let strict = router
			.fill_listings_tx(&listings, taker(), NATIVE_CURRENCY, &FillOptions::default())
			.await;
		assert!(matches!(strict, Err(FillError::UnrecoverableOrder { .. })));

		let partial = router
			.fill_listings_tx(
				&listings,
				taker(),
				NATIVE_CURRENCY,
				&FillOptions {
					partial: true,
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert!(partial.txs.is_empty());
		assert_eq!(partial.success.get("a"), Some(&false));
		assert!(partial.errors[0].message.contains("no fill route"));
	}

	#[tokio::test]
	async fn test_missing_module_drops_bucket() {
		let mut addresses = AddressBook::default();
		addresses.modules.remove("looks-rare-v2");
		let router = Router::new(
			addresses,
			ChainSettings::default(),
			FillSettings::default(),
			test_registry(),
			test_quoter(),
			Arc::new(StubFetcher::default()),
			Arc::new(StaticChainReader::new()),
		);
		let out = router
			.fill_listings_tx(
				&[listing("a", OrderKind::LooksRareV2, 100)],
				taker(),
				NATIVE_CURRENCY,
				&FillOptions {
					partial: true,
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert!(out.txs.is_empty());
		assert!(out.errors[0].message.contains("no looks-rare-v2 module"));
	}

	#[tokio::test]
	async fn test_fetched_calldata_batches_by_contract() {
		let mut fetcher = StubFetcher::default();
		let blur_contract = Address::repeat_byte(0x11);
		let x2y2_contract = Address::repeat_byte(0x12);
		fetcher.fills.insert(
			blur_contract,
			FetchedBatch {
				tx_data: TxData {
					from: taker(),
					to: Address::repeat_byte(0xd1),
					data: Bytes::from(vec![0x01]),
					value: U256::from(300),
				},
				pre_sign: Some(json!({"kind": "blur-auth"})),
			},
		);
		fetcher.fills.insert(
			x2y2_contract,
			FetchedBatch {
				tx_data: TxData {
					from: taker(),
					to: Address::repeat_byte(0xd2),
					data: Bytes::from(vec![0x02]),
					value: U256::from(400),
				},
				pre_sign: None,
			},
		);
		let fetcher = Arc::new(fetcher);
		let router = router_with(fetcher.clone(), test_quoter());

		let mut b1 = listing("b1", OrderKind::Blur, 100);
		let mut b2 = listing("b2", OrderKind::Blur, 200);
		b1.contract = blur_contract;
		b2.contract = blur_contract;
		let mut x1 = listing("x1", OrderKind::X2y2, 400);
		x1.contract = x2y2_contract;
		let options = FillOptions {
			auth_tokens: HashMap::from([("blur.io".to_string(), "tok".to_string())]),
			..Default::default()
		};
		let out = router
			.fill_listings_tx(&[b1, b2, x1], taker(), NATIVE_CURRENCY, &options)
			.await
			.unwrap();

		assert_eq!(out.txs.len(), 2);
		assert_eq!(out.txs[0].order_ids, vec!["b1".to_string(), "b2".to_string()]);
		assert_eq!(out.txs[1].order_ids, vec!["x1".to_string()]);
		assert_eq!(out.pre_signatures.len(), 1);
		assert_eq!(out.pre_signatures[0].order_ids, vec!["b1".to_string(), "b2".to_string()]);
		assert!(out.success.values().all(|&planned| planned));

		let seen = fetcher.seen.lock().unwrap();
		assert_eq!(seen.len(), 2);
		assert_eq!(seen[0].items.len(), 2);
		assert_eq!(seen[0].auth.as_deref(), Some("tok"));
		assert_eq!(seen[1].auth, None);
	}

	#[tokio::test]
	async fn test_blur_without_auth_token_is_transient() {
		let fetcher = Arc::new(StubFetcher::default());
		let router = router_with(fetcher.clone(), test_quoter());
		let listings = vec![listing("a", OrderKind::Blur, 100)];

		let strict = router
			.fill_listings_tx(&listings, taker(), NATIVE_CURRENCY, &FillOptions::default())
			.await;
		assert!(matches!(strict, Err(FillError::TransientOrder { .. })));

		let out = router
			.fill_listings_tx(
				&listings,
				taker(),
				NATIVE_CURRENCY,
				&FillOptions {
					partial: true,
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert_eq!(out.success.get("a"), Some(&false));
		assert!(!out.errors[0].unrecoverable);
		assert!(out.errors[0].message.contains("authentication"));
		// No batch is dispatched without the token.
		assert!(fetcher.seen.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_flagged_token_never_reaches_the_calldata_service() {
		let fetcher = Arc::new(StubFetcher::default());
		let router = router_with(fetcher.clone(), test_quoter());
		let mut flagged = listing("a", OrderKind::Blur, 100);
		flagged.flagged = true;

		let out = router
			.fill_listings_tx(
				&[flagged],
				taker(),
				NATIVE_CURRENCY,
				&FillOptions {
					partial: true,
					auth_tokens: HashMap::from([("blur.io".to_string(), "tok".to_string())]),
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert!(out.txs.is_empty());
		assert!(out.errors[0].unrecoverable);
		assert!(out.errors[0].message.contains("flagged"));
		assert!(fetcher.seen.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_gone_calldata_is_unrecoverable() {
		let mut fetcher = StubFetcher::default();
		fetcher
			.failures
			.insert(Address::repeat_byte(0x11), FetchError::Gone("order filled".to_string()));
		let router = router_with(Arc::new(fetcher), test_quoter());
		let out = router
			.fill_listings_tx(
				&[listing("a", OrderKind::X2y2, 100)],
				taker(),
				NATIVE_CURRENCY,
				&FillOptions {
					partial: true,
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert!(out.txs.is_empty());
		assert!(out.errors[0].unrecoverable);
		assert_eq!(out.success.get("a"), Some(&false));
	}

	#[tokio::test]
	async fn test_dedicated_fill_is_standalone_tx() {
		let router = test_router();
		let listings = vec![
			listing("f1", OrderKind::Foundation, 700),
			listing("a", OrderKind::SeaportV15, 100),
		];
		let out = router
			.fill_listings_tx(&listings, taker(), NATIVE_CURRENCY, &FillOptions::default())
			.await
			.unwrap();

		assert_eq!(out.txs.len(), 2);
		assert_eq!(out.txs[0].tx_data.to, book().exchange("foundation").unwrap());
		assert_eq!(out.txs[0].tx_data.value, U256::from(700));
		assert_eq!(out.txs[0].order_ids, vec!["f1".to_string()]);
		// The remaining listing still qualifies for the direct path.
		assert_eq!(out.txs[1].tx_data.to, book().exchange("seaport-v1.5").unwrap());
	}

	#[tokio::test]
	async fn test_dedicated_fill_rejects_attached_fees() {
		let router = test_router();
		let mut fee_listing = listing("f1", OrderKind::Foundation, 700);
		fee_listing.fees = vec![Fee {
			recipient: Address::repeat_byte(0x99),
			amount: U256::from(10),
		}];
		let out = router
			.fill_listings_tx(
				&[fee_listing],
				taker(),
				NATIVE_CURRENCY,
				&FillOptions {
					partial: true,
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert!(out.txs.is_empty());
		assert!(out.errors[0].unrecoverable);
		assert!(out.errors[0].message.contains("cannot carry on-top fees"));
	}

	#[tokio::test]
	async fn test_mints_compile_to_template_calls() {
		let router = test_router();
		let mint = MintDetail {
			collection: "0x1111:azuki".to_string(),
			contract: Address::repeat_byte(0x11),
			stage: "public-sale".to_string(),
			token_id: None,
			quantity: 2,
			price: U256::from(2_000),
			currency: NATIVE_CURRENCY,
			tx_template: MintTxTemplate {
				to: Address::repeat_byte(0x11),
				calldata: MintCalldataTemplate {
					signature: "0xa0712d68".to_string(),
					params: vec![
						MintParam {
							kind: MintParamKind::Recipient,
							abi_type: "address".to_string(),
							value: None,
						},
						MintParam {
							kind: MintParamKind::Quantity,
							abi_type: "uint256".to_string(),
							value: None,
						},
					],
				},
			},
		};
		let out = router
			.fill_mints_tx(&[mint], taker(), &FillOptions::default())
			.unwrap();

		assert_eq!(out.txs.len(), 1);
		assert_eq!(out.txs[0].tx_data.to, Address::repeat_byte(0x11));
		assert_eq!(out.txs[0].tx_data.from, taker());
		assert_eq!(out.txs[0].tx_data.value, U256::from(2_000));
		assert_eq!(out.success.get("mint:0x1111:azuki"), Some(&true));
	}
}
