//! Table-driven swap quoter.
//!
//! Routes are configured as integer fractions plus a Uniswap V3 fee tier.
//! The produced calldata is a real `exactOutputSingle` call against the DEX
//! router the swap module fronts, so plans built from this quoter look
//! exactly like production plans.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use aggregator_types::num::{mul_div_ceil, BPS_DENOMINATOR};
use aggregator_types::u256_string;
use alloy_primitives::{
	aliases::{U160, U24},
	Address, U256,
};
use alloy_sol_types::{sol, SolCall};

use crate::{SwapError, SwapQuote, SwapQuoter};

sol! {
	struct ExactOutputSingleParams {
		address tokenIn;
		address tokenOut;
		uint24 fee;
		address recipient;
		uint256 amountOut;
		uint256 amountInMaximum;
		uint160 sqrtPriceLimitX96;
	}

	interface IV3SwapRouter {
		function exactOutputSingle(
			ExactOutputSingleParams params
		) external payable returns (uint256 amountIn);
	}
}

fn default_fee_tier() -> u32 {
	3000
}

fn default_slippage_bps() -> u64 {
	50
}

/// One configured swap route.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
	pub token_in: Address,
	pub token_out: Address,
	/// Price as a fraction: `amount_in = amount_out * numerator / denominator`.
	#[serde(with = "u256_string")]
	pub numerator: U256,
	#[serde(with = "u256_string")]
	pub denominator: U256,
	/// Uniswap V3 pool fee tier.
	#[serde(default = "default_fee_tier")]
	pub fee_tier: u32,
	/// Headroom added to the quoted input.
	#[serde(default = "default_slippage_bps")]
	pub slippage_bps: u64,
}

/// Configuration schema for the fixed quoter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixedSwapConfig {
	#[serde(default)]
	pub routes: Vec<RouteEntry>,
	/// Recipient baked into the DEX calldata; in deployments this is the
	/// swap module, which forwards funds per its transfer list.
	#[serde(default)]
	pub recipient: Option<Address>,
}

struct Route {
	numerator: U256,
	denominator: U256,
	fee_tier: u32,
	slippage_bps: u64,
}

/// [`SwapQuoter`] backed by a fixed route table.
pub struct FixedSwapQuoter {
	routes: HashMap<(Address, Address), Route>,
	recipient: Address,
}

impl FixedSwapQuoter {
	pub fn new(config: FixedSwapConfig) -> Self {
		let mut routes = HashMap::new();
		for entry in config.routes {
			routes.insert(
				(entry.token_in, entry.token_out),
				Route {
					numerator: entry.numerator,
					denominator: entry.denominator,
					fee_tier: entry.fee_tier,
					slippage_bps: entry.slippage_bps,
				},
			);
		}
		FixedSwapQuoter {
			routes,
			recipient: config.recipient.unwrap_or(Address::ZERO),
		}
	}

	fn route(&self, token_in: Address, token_out: Address) -> Option<(U256, U256, u32, u64)> {
		if let Some(route) = self.routes.get(&(token_in, token_out)) {
			return Some((
				route.numerator,
				route.denominator,
				route.fee_tier,
				route.slippage_bps,
			));
		}
		// Derived reverse direction.
		self.routes
			.get(&(token_out, token_in))
			.map(|route| (route.denominator, route.numerator, route.fee_tier, route.slippage_bps))
	}
}

#[async_trait]
impl SwapQuoter for FixedSwapQuoter {
	async fn quote_exact_output(
		&self,
		token_in: Address,
		token_out: Address,
		amount_out: U256,
	) -> Result<SwapQuote, SwapError> {
		let (numerator, denominator, fee_tier, slippage_bps) = self
			.route(token_in, token_out)
			.ok_or(SwapError::NoRoute {
				from: token_in,
				to: token_out,
			})?;

		let base_in = mul_div_ceil(amount_out, numerator, denominator);
		let amount_in = mul_div_ceil(
			base_in,
			U256::from(BPS_DENOMINATOR + slippage_bps),
			U256::from(BPS_DENOMINATOR),
		);

		let params = ExactOutputSingleParams {
			tokenIn: token_in,
			tokenOut: token_out,
			fee: U24::from(fee_tier),
			recipient: self.recipient,
			amountOut: amount_out,
			amountInMaximum: amount_in,
			sqrtPriceLimitX96: U160::ZERO,
		};
		let router_calldata = IV3SwapRouter::exactOutputSingleCall { params }.abi_encode();

		Ok(SwapQuote {
			amount_in,
			router_calldata: router_calldata.into(),
		})
	}
}

/// Factory function to create a swap quoter from configuration.
pub fn create_swap(config: &toml::Value) -> Box<dyn SwapQuoter> {
	let config: FixedSwapConfig = config
		.clone()
		.try_into()
		.expect("fixed swap config must be valid");
	tracing::debug!(routes = config.routes.len(), "loaded swap route table");
	Box::new(FixedSwapQuoter::new(config))
}
