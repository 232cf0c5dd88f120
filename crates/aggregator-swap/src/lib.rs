//! Currency swap planning.
//!
//! When the taker pays in one currency but the path needs another, the plan
//! prepends a swap through the swap module. The [`SwapQuoter`] answers "how
//! much input buys this exact output, and what does the DEX call look like";
//! assembling the module transaction around that quote happens here too.

use async_trait::async_trait;
use thiserror::Error;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

/// Re-export implementations
pub mod implementations {
	pub mod fixed;
}

sol! {
	/// Payout leg of a swap: where the acquired funds go.
	struct SwapTransfer {
		address recipient;
		uint256 amount;
		bool toNative;
	}

	interface ISwapModule {
		function ethToExactOutput(
			bytes swapData,
			SwapTransfer[] transfers,
			address refundTo
		) payable;

		function erc20ToExactOutput(
			address tokenIn,
			uint256 amountInMaximum,
			bytes swapData,
			SwapTransfer[] transfers,
			address refundTo
		);
	}
}

/// Errors that can occur while planning swaps.
#[derive(Debug, Error)]
pub enum SwapError {
	/// No route between the two currencies.
	#[error("no swap route from {from} to {to}")]
	NoRoute { from: Address, to: Address },
	/// The quoting backend failed.
	#[error("swap backend error: {0}")]
	Backend(String),
}

/// A quoted exact-output swap.
#[derive(Debug, Clone)]
pub struct SwapQuote {
	/// Maximum input spent, slippage included.
	pub amount_in: U256,
	/// Calldata for the DEX router, executed by the swap module.
	pub router_calldata: Bytes,
}

/// Quotes exact-output swaps between pool currencies.
///
/// Callers pass currencies in their pooled form (native already collapsed to
/// wrapped); implementations never see the native sentinel.
#[async_trait]
pub trait SwapQuoter: Send + Sync {
	/// Quotes buying exactly `amount_out` of `token_out` with `token_in`.
	async fn quote_exact_output(
		&self,
		token_in: Address,
		token_out: Address,
		amount_out: U256,
	) -> Result<SwapQuote, SwapError>;
}

/// Where the swapped funds should be delivered.
#[derive(Debug, Clone)]
pub struct SwapDelivery {
	pub recipient: Address,
	pub amount: U256,
	/// Unwrap to native before delivering.
	pub to_native: bool,
}

/// A swap module call ready to be placed at the front of a plan.
#[derive(Debug, Clone)]
pub struct PlannedSwap {
	/// The swap module.
	pub to: Address,
	/// Encoded module call.
	pub data: Bytes,
	/// Native value attached (the input, when paying with native).
	pub value: U256,
	/// Maximum input spent.
	pub amount_in: U256,
}

/// Encodes the swap module transaction around a quote.
///
/// `buy_in_is_native` selects between the payable entrypoint (input carried
/// as value) and the ERC-20 entrypoint (input pulled via the approval proxy).
pub fn build_swap_execution(
	swap_module: Address,
	token_in: Address,
	buy_in_is_native: bool,
	quote: &SwapQuote,
	deliveries: Vec<SwapDelivery>,
	refund_to: Address,
) -> PlannedSwap {
	let transfers: Vec<SwapTransfer> = deliveries
		.into_iter()
		.map(|delivery| SwapTransfer {
			recipient: delivery.recipient,
			amount: delivery.amount,
			toNative: delivery.to_native,
		})
		.collect();

	if buy_in_is_native {
		let data = ISwapModule::ethToExactOutputCall {
			swapData: quote.router_calldata.clone(),
			transfers,
			refundTo: refund_to,
		}
		.abi_encode();
		PlannedSwap {
			to: swap_module,
			data: data.into(),
			value: quote.amount_in,
			amount_in: quote.amount_in,
		}
	} else {
		let data = ISwapModule::erc20ToExactOutputCall {
			tokenIn: token_in,
			amountInMaximum: quote.amount_in,
			swapData: quote.router_calldata.clone(),
			transfers,
			refundTo: refund_to,
		}
		.abi_encode();
		PlannedSwap {
			to: swap_module,
			data: data.into(),
			value: U256::ZERO,
			amount_in: quote.amount_in,
		}
	}
}
