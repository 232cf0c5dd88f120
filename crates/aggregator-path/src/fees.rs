//! Buy-in currency resolution and global fee distribution.
//!
//! Once the path is assembled, caller-supplied global fees are spread evenly
//! over the path items allowed to carry them, converted into each item's
//! settlement currency where needed, and mirrored into the listing details so
//! the execution planner embeds them in calldata.

use alloy_primitives::{Address, U256};
use tracing::debug;

use aggregator_config::FeeSettings;
use aggregator_pricing::{CurrencyRegistry, PriceOracle};
use aggregator_types::{
	num::{bps_of, format_units},
	AppliedFee, Fee, FillError, ListingDetail, OrderKind, PathItem, NATIVE_CURRENCY,
};

/// Picks the currency the taker pays with.
///
/// An explicit choice always wins. Otherwise, a path settling in a single
/// currency uses that currency, and mixed-currency paths fall back to the
/// native coin.
pub fn resolve_buy_in(path: &[PathItem], requested: Option<Address>) -> Address {
	if let Some(currency) = requested {
		return currency;
	}
	let mut currencies = path.iter().map(|item| item.currency);
	match currencies.next() {
		Some(first) if currencies.all(|c| c == first) => first,
		_ => NATIVE_CURRENCY,
	}
}

/// Maps each path index to its listing index. Mint entries have none; every
/// other entry aligns with the listing details in construction order.
fn listing_indices(path: &[PathItem]) -> Vec<Option<usize>> {
	let mut next = 0usize;
	path.iter()
		.map(|item| {
			if item.kind == OrderKind::Mint {
				None
			} else {
				let index = next;
				next += 1;
				Some(index)
			}
		})
		.collect()
}

/// Indices of path items allowed to carry global fees.
///
/// Mint entries never carry them. Items from excluded marketplaces are
/// skipped, and once the path contains any order from the primary excluded
/// marketplace the expanded exclusion list applies to the whole path.
fn eligible_items(path: &[PathItem], settings: &FeeSettings) -> Vec<usize> {
	let primary = settings.excluded_sources.first().map(String::as_str);
	let expand = path.iter().any(|item| {
		item.kind.requires_offchain_auth() || (primary.is_some() && item.source.as_deref() == primary)
	});
	let excluded: &[String] = if expand {
		&settings.excluded_sources_expanded
	} else {
		&settings.excluded_sources
	};

	path.iter()
		.enumerate()
		.filter(|(_, item)| item.kind != OrderKind::Mint)
		.filter(|(_, item)| {
			item.source
				.as_deref()
				.map_or(true, |source| !excluded.iter().any(|e| e == source))
		})
		.map(|(index, _)| index)
		.collect()
}

/// Splits every global fee evenly across the eligible path items.
///
/// Slices are computed in the buy-in currency so they sum exactly to the fee
/// amount, then converted into each item's currency. Conversion failures are
/// fatal: a fee that cannot be charged would silently change what the caller
/// asked to pay.
pub async fn distribute_global_fees(
	path: &mut [PathItem],
	listings: &mut [ListingDetail],
	fees: &[Fee],
	buy_in: Address,
	oracle: &dyn PriceOracle,
	settings: &FeeSettings,
) -> Result<(), FillError> {
	// Zero-amount or zero-recipient fees are dropped before use.
	let fees: Vec<&Fee> = fees
		.iter()
		.filter(|fee| fee.recipient != Address::ZERO && !fee.amount.is_zero())
		.collect();
	if fees.is_empty() {
		return Ok(());
	}

	let eligible = eligible_items(path, settings);
	if eligible.is_empty() {
		return Err(FillError::Validation(
			"global fees cannot be applied to any item in this path".to_string(),
		));
	}
	let indices = listing_indices(path);

	for fee in fees {
		let count = U256::from(eligible.len() as u64);
		let share = fee.amount / count;
		let mut remainder = fee.amount - share * count;

		for &index in &eligible {
			let mut slice = share;
			if !remainder.is_zero() {
				slice += U256::from(1);
				remainder -= U256::from(1);
			}
			if slice.is_zero() {
				continue;
			}

			let item = &mut path[index];
			let amount = if item.currency == buy_in {
				slice
			} else {
				oracle
					.convert(buy_in, item.currency, slice, false)
					.await
					.map_err(|e| {
						debug!(error = %e, "global fee conversion failed");
						FillError::SwapUnavailable {
							from: buy_in,
							to: item.currency,
						}
					})?
			};

			item.add_fee_on_top(AppliedFee {
				recipient: fee.recipient,
				amount,
				bps: bps_of(amount, item.raw_quote),
			});
			if let Some(listing_index) = indices[index] {
				listings[listing_index].fees.push(Fee {
					recipient: fee.recipient,
					amount,
				});
			}
		}
	}
	Ok(())
}

/// Fills in currency metadata and best-effort buy-in quotes.
///
/// Quotes are display-only: a stale rate is acceptable and a missing rate
/// just leaves the quote off the item.
pub async fn attach_quotes(
	path: &mut [PathItem],
	buy_in: Address,
	registry: &CurrencyRegistry,
	oracle: &dyn PriceOracle,
) {
	for item in path.iter_mut() {
		if let Some(currency) = registry.currency(item.currency) {
			item.currency_symbol = Some(currency.symbol.clone());
			item.currency_decimals = Some(currency.decimals);
			debug!(
				order_id = %item.order_id,
				price = %format_units(item.total_raw_price, currency.decimals),
				symbol = %currency.symbol,
				"priced path item"
			);
		}
		if item.currency == buy_in {
			continue;
		}
		item.buy_in_currency = Some(buy_in);
		match oracle
			.convert(item.currency, buy_in, item.total_raw_price, true)
			.await
		{
			Ok(quote) => item.buy_in_raw_quote = Some(quote),
			Err(e) => {
				debug!(order_id = %item.order_id, error = %e, "buy-in quote unavailable");
			}
		}
	}
}
