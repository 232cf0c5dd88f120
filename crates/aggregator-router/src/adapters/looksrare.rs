//! LooksRare v2 fills.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use serde::Deserialize;

use aggregator_types::{is_native, ContractKind, ExecutionInfo, Fee, ListingDetail, OrderKind};

use super::{
	bucket_total, erc20_params, module_fees, native_params, parse_payload, FillParams,
	ILooksRareModule, LooksRareMakerOrder, ProtocolAdapter,
};
use crate::RouterError;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct LooksRareOrderData {
	global_nonce: U256,
	subset_nonce: U256,
	order_nonce: U256,
	strategy_id: U256,
	collection_type: Option<u8>,
	start_time: u64,
	end_time: u64,
	additional_parameters: Bytes,
	signature: Bytes,
}

fn maker_order(listing: &ListingDetail, data: &LooksRareOrderData) -> LooksRareMakerOrder {
	let collection_type = data.collection_type.unwrap_or(match listing.contract_kind {
		ContractKind::Erc721 => 0,
		ContractKind::Erc1155 => 1,
	});
	LooksRareMakerOrder {
		// quoteType 1 is an ask.
		quoteType: 1,
		globalNonce: data.global_nonce,
		subsetNonce: data.subset_nonce,
		orderNonce: data.order_nonce,
		strategyId: data.strategy_id,
		collectionType: collection_type,
		collection: listing.contract,
		currency: listing.currency,
		signer: listing.maker,
		startTime: U256::from(data.start_time),
		endTime: U256::from(data.end_time),
		price: listing.price,
		itemIds: vec![listing.token_id.unwrap_or_default()],
		amounts: vec![U256::from(listing.quantity.max(1))],
		additionalParameters: data.additional_parameters.clone(),
	}
}

pub struct LooksRareAdapter;

impl ProtocolAdapter for LooksRareAdapter {
	fn module_name(&self, _kind: OrderKind) -> &'static str {
		"looks-rare-v2"
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
		let mut orders = Vec::with_capacity(listings.len());
		let mut signatures = Vec::with_capacity(listings.len());
		for listing in listings {
			let data: LooksRareOrderData = parse_payload(listing)?;
			orders.push(maker_order(listing, &data));
			signatures.push(data.signature);
		}
		let total = bucket_total(listings);
		let currency = listings[0].currency;
		let (data, value) = if is_native(currency) {
			let call = ILooksRareModule::acceptETHListingsCall {
				orders,
				signatures,
				params: native_params(params, total),
				fees: module_fees(fees),
			};
			(call.abi_encode(), total)
		} else {
			let call = ILooksRareModule::acceptERC20ListingsCall {
				orders,
				signatures,
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
