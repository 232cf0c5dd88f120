//! Bonding-curve pool fills: Sudoswap and NFTX.
//!
//! Pool listings carry no signed payload; the maker address is the pool
//! itself and the id list may be empty for "any token" fills. Pools only
//! settle in the native currency.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

use aggregator_types::{ExecutionInfo, Fee, ListingDetail, OrderKind};

use super::{
	bucket_total, module_fees, native_params, require_native, FillParams, INftxModule,
	ISudoswapModule, ProtocolAdapter,
};
use crate::RouterError;

fn pool_args(listings: &[&ListingDetail]) -> (Vec<Address>, Vec<Vec<U256>>, Vec<U256>) {
	let mut pools = Vec::with_capacity(listings.len());
	let mut ids = Vec::with_capacity(listings.len());
	let mut amounts = Vec::with_capacity(listings.len());
	for listing in listings {
		pools.push(listing.maker);
		ids.push(listing.token_id.map(|id| vec![id]).unwrap_or_default());
		amounts.push(U256::from(listing.quantity.max(1)));
	}
	(pools, ids, amounts)
}

pub struct SudoswapAdapter;

impl ProtocolAdapter for SudoswapAdapter {
	fn module_name(&self, kind: OrderKind) -> &'static str {
		match kind {
			OrderKind::SudoswapV2 => "sudoswap-v2",
			_ => "sudoswap",
		}
	}

	fn build_fill(
		&self,
		module: Address,
		listings: &[&ListingDetail],
		fees: &[Fee],
		params: &FillParams,
	) -> Result<ExecutionInfo, RouterError> {
		require_native(listings[0].kind, listings[0].currency)?;
		let total = bucket_total(listings);
		let (pairs, nft_ids, amounts) = pool_args(listings);
		let call = ISudoswapModule::buyWithETHCall {
			pairs,
			nftIds: nft_ids,
			amounts,
			params: native_params(params, total),
			fees: module_fees(fees),
		};
		Ok(ExecutionInfo {
			module,
			data: call.abi_encode().into(),
			value: total,
		})
	}
}

pub struct NftxAdapter;

impl ProtocolAdapter for NftxAdapter {
	fn module_name(&self, kind: OrderKind) -> &'static str {
		match kind {
			OrderKind::NftxV3 => "nftx-v3",
			_ => "nftx",
		}
	}

	fn build_fill(
		&self,
		module: Address,
		listings: &[&ListingDetail],
		fees: &[Fee],
		params: &FillParams,
	) -> Result<ExecutionInfo, RouterError> {
		require_native(listings[0].kind, listings[0].currency)?;
		let total = bucket_total(listings);
		let (vaults, specific_ids, amounts) = pool_args(listings);
		let call = INftxModule::buyWithETHCall {
			vaults,
			specificIds: specific_ids,
			amounts,
			params: native_params(params, total),
			fees: module_fees(fees),
		};
		Ok(ExecutionInfo {
			module,
			data: call.abi_encode().into(),
			value: total,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use aggregator_types::{ContractKind, NATIVE_CURRENCY};

	fn pool_listing(id: &str, pool: u8, token_id: Option<u64>, quantity: u64) -> ListingDetail {
		ListingDetail {
			order_id: id.to_string(),
			kind: OrderKind::Sudoswap,
			contract: Address::repeat_byte(0x11),
			contract_kind: ContractKind::Erc721,
			token_id: token_id.map(U256::from),
			quantity,
			flagged: false,
			maker: Address::repeat_byte(pool),
			source: None,
			currency: NATIVE_CURRENCY,
			price: U256::from(quantity * 700),
			fees: vec![],
			raw_data: serde_json::Value::Null,
		}
	}

	fn params() -> FillParams {
		FillParams {
			fill_to: Address::repeat_byte(0x33),
			refund_to: Address::repeat_byte(0x33),
			revert_if_incomplete: true,
		}
	}

	#[test]
	fn test_pool_fill_flattens_pairs_ids_and_amounts() {
		let specific = pool_listing("pool-1", 0xaa, Some(12), 1);
		let any = pool_listing("pool-2", 0xab, None, 2);
		let exec = SudoswapAdapter
			.build_fill(Address::repeat_byte(0xb8), &[&specific, &any], &[], &params())
			.unwrap();
		assert_eq!(exec.value, U256::from(2_100));
		let call = ISudoswapModule::buyWithETHCall::abi_decode(&exec.data).unwrap();
		assert_eq!(call.pairs.len(), 2);
		assert_eq!(call.pairs[0], Address::repeat_byte(0xaa));
		assert_eq!(call.nftIds[0], vec![U256::from(12)]);
		assert!(call.nftIds[1].is_empty());
		assert_eq!(call.amounts, vec![U256::from(1), U256::from(2)]);
	}

	#[test]
	fn test_pools_reject_erc20_settlement() {
		let mut l = pool_listing("pool-1", 0xaa, Some(12), 1);
		l.currency = Address::repeat_byte(0x55);
		let err = SudoswapAdapter
			.build_fill(Address::repeat_byte(0xb8), &[&l], &[], &params())
			.unwrap_err();
		assert!(matches!(err, RouterError::Currency { .. }));
	}
}
