//! Pre-submission solvency check.

use alloy_primitives::{Address, U256};
use tracing::warn;

use aggregator_chain::ChainReader;
use aggregator_types::PathItem;

/// Compares the taker's buy-in balance against the plan total and returns a
/// warning when it falls short. Advisory only: the plan is returned either
/// way, since balances can change between planning and submission.
pub(crate) async fn balance_warning(
	chain: &dyn ChainReader,
	taker: Address,
	buy_in: Address,
	path: &[PathItem],
) -> Option<String> {
	let total = path.iter().fold(U256::ZERO, |acc, item| {
		acc.saturating_add(item.buy_in_raw_quote.unwrap_or(item.total_raw_price))
	});
	if total.is_zero() {
		return None;
	}
	match chain.currency_balance(buy_in, taker).await {
		Ok(balance) if balance < total => Some(format!(
			"taker balance {balance} is below the plan total {total}"
		)),
		Ok(_) => None,
		Err(e) => {
			warn!(error = %e, "balance check failed, skipping");
			None
		}
	}
}
