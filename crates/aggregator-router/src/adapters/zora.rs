//! Zora v3 ask fills.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use serde::Deserialize;

use aggregator_types::{is_native, ExecutionInfo, Fee, ListingDetail, OrderKind};

use super::{
	bucket_total, erc20_params, module_fees, native_params, parse_payload, FillParams, IZoraModule,
	ProtocolAdapter, ZoraAsk,
};
use crate::RouterError;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ZoraOrderData {
	finder: Option<Address>,
}

pub struct ZoraAdapter;

impl ProtocolAdapter for ZoraAdapter {
	fn module_name(&self, _kind: OrderKind) -> &'static str {
		"zora-v3"
	}

	fn supports_erc20(&self) -> bool {
		true
	}

	fn build_fill(
		&self,
		module: Address,
		listings: &[&ListingDetail],
		fees: &[Fee],
		params: &FillParams,
	) -> Result<ExecutionInfo, RouterError> {
		let mut asks = Vec::with_capacity(listings.len());
		for listing in listings {
			let data: ZoraOrderData = parse_payload(listing)?;
			let token_id = listing.token_id.ok_or_else(|| RouterError::Payload {
				order_id: listing.order_id.clone(),
				message: "missing token id".to_string(),
			})?;
			asks.push(ZoraAsk {
				collection: listing.contract,
				tokenId: token_id,
				currency: if is_native(listing.currency) {
					Address::ZERO
				} else {
					listing.currency
				},
				price: listing.price,
				finder: data.finder.unwrap_or(Address::ZERO),
			});
		}
		let total = bucket_total(listings);
		let currency = listings[0].currency;
		let (data, value) = if is_native(currency) {
			let call = IZoraModule::fillAsksCall {
				asks,
				params: native_params(params, total),
				fees: module_fees(fees),
			};
			(call.abi_encode(), total)
		} else {
			let call = IZoraModule::fillAsksERC20Call {
				asks,
				params: erc20_params(params, currency, total),
				fees: module_fees(fees),
			};
			(call.abi_encode(), U256::ZERO)
		};
		Ok(ExecutionInfo {
			module,
			data: data.into(),
			value,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use aggregator_types::{ContractKind, NATIVE_CURRENCY};

	#[test]
	fn test_ask_fill_carries_collection_and_price() {
		let l = ListingDetail {
			order_id: "zora-1".to_string(),
			kind: OrderKind::ZoraV3,
			contract: Address::repeat_byte(0x11),
			contract_kind: ContractKind::Erc721,
			token_id: Some(U256::from(77)),
			quantity: 1,
			flagged: false,
			maker: Address::repeat_byte(0x22),
			source: None,
			currency: NATIVE_CURRENCY,
			price: U256::from(2_500),
			fees: vec![],
			raw_data: serde_json::Value::Null,
		};
		let exec = ZoraAdapter
			.build_fill(
				Address::repeat_byte(0xbe),
				&[&l],
				&[],
				&FillParams {
					fill_to: Address::repeat_byte(0x33),
					refund_to: Address::repeat_byte(0x33),
					revert_if_incomplete: true,
				},
			)
			.unwrap();
		let call = IZoraModule::fillAsksCall::abi_decode(&exec.data).unwrap();
		assert_eq!(call.asks[0].collection, l.contract);
		assert_eq!(call.asks[0].tokenId, U256::from(77));
		assert_eq!(call.asks[0].price, U256::from(2_500));
		assert_eq!(call.asks[0].finder, Address::ZERO);
	}
}
