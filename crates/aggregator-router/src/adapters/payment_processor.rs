//! Payment processor fills.
//!
//! Fills only clear for takers registered with the exchange, so plans that
//! touch this protocol also surface a one-off registration transaction.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolCall};
use serde::Deserialize;

use aggregator_types::{is_native, ContractKind, ExecutionInfo, Fee, ListingDetail, OrderKind, TxData};

use super::{
	bucket_total, erc20_params, module_fees, native_params, parse_payload, FillParams,
	IPaymentProcessorModule, PaymentProcessorOrder, PaymentProcessorSignature, ProtocolAdapter,
};
use crate::RouterError;

sol! {
	interface IPaymentProcessorExchange {
		function registerTaker(address taker) external;
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct PaymentProcessorOrderData {
	protocol: Option<u8>,
	marketplace: Address,
	nonce: U256,
	expiration: u64,
	marketplace_fee_numerator: U256,
	max_royalty_fee_numerator: U256,
	v: u8,
	r: B256,
	s: B256,
}

pub struct PaymentProcessorAdapter;

impl ProtocolAdapter for PaymentProcessorAdapter {
	fn module_name(&self, _kind: OrderKind) -> &'static str {
		"payment-processor"
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
			let data: PaymentProcessorOrderData = parse_payload(listing)?;
			let token_id = listing.token_id.ok_or_else(|| RouterError::Payload {
				order_id: listing.order_id.clone(),
				message: "missing token id".to_string(),
			})?;
			let protocol = data.protocol.unwrap_or(match listing.contract_kind {
				ContractKind::Erc721 => 0,
				ContractKind::Erc1155 => 1,
			});
			orders.push(PaymentProcessorOrder {
				protocol,
				marketplace: data.marketplace,
				maker: listing.maker,
				tokenAddress: listing.contract,
				tokenId: token_id,
				amount: U256::from(listing.quantity.max(1)),
				paymentCoin: if is_native(listing.currency) {
					Address::ZERO
				} else {
					listing.currency
				},
				price: listing.price,
				expiration: U256::from(data.expiration),
				nonce: data.nonce,
				marketplaceFeeNumerator: data.marketplace_fee_numerator,
				maxRoyaltyFeeNumerator: data.max_royalty_fee_numerator,
			});
			signatures.push(PaymentProcessorSignature {
				v: data.v,
				r: data.r,
				s: data.s,
			});
		}
		let total = bucket_total(listings);
		let currency = listings[0].currency;
		let (data, value) = if is_native(currency) {
			let call = IPaymentProcessorModule::acceptETHListingsCall {
				orders,
				signatures,
				params: native_params(params, total),
				fees: module_fees(fees),
			};
			(call.abi_encode(), total)
		} else {
			let call = IPaymentProcessorModule::acceptERC20ListingsCall {
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

/// Taker registration against the exchange, prerequisite to any fill.
pub(crate) fn auth_transaction(exchange: Address, taker: Address) -> TxData {
	let call = IPaymentProcessorExchange::registerTakerCall { taker };
	TxData {
		from: taker,
		to: exchange,
		data: call.abi_encode().into(),
		value: U256::ZERO,
	}
}
