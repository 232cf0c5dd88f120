//! Seaport-family fills.
//!
//! One adapter serves Seaport, its versioned deployments and the Alienswap
//! fork; only the module address differs. Also home to the direct exchange
//! fill used when a single native listing can skip the router.

use alloy_primitives::{aliases::U120, Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use serde::Deserialize;

use aggregator_types::{is_native, ContractKind, ExecutionInfo, Fee, ListingDetail, OrderKind, TxData};

use super::{
	bucket_total, erc20_params, module_fees, native_params, parse_payload, AdvancedOrder,
	ConsiderationItem, FillParams, FulfillmentComponent, ISeaportExchange, ISeaportModule,
	OfferItem, OrderParameters, ProtocolAdapter,
};
use crate::RouterError;

/// Stored order payload. Orders sourced from marketplace APIs carry the full
/// signed parameter set; orders synthesized elsewhere may be sparse, in which
/// case the missing pieces are completed from the listing.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct SeaportOrderData {
	offerer: Option<Address>,
	zone: Address,
	offer: Vec<SeaportItem>,
	consideration: Vec<SeaportRecipientItem>,
	order_type: u8,
	start_time: u64,
	end_time: u64,
	zone_hash: B256,
	salt: U256,
	conduit_key: B256,
	/// Order-wide unit count, for partial 1155 fills.
	total_size: Option<u64>,
	signature: Bytes,
	extra_data: Bytes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SeaportItem {
	item_type: u8,
	token: Address,
	identifier_or_criteria: U256,
	start_amount: U256,
	end_amount: U256,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SeaportRecipientItem {
	item_type: u8,
	token: Address,
	identifier_or_criteria: U256,
	start_amount: U256,
	end_amount: U256,
	recipient: Address,
}

/// Builds the signed order struct, synthesizing offer and consideration for
/// sparse payloads. A synthesized order covers exactly the listed fill, so
/// the fraction is always total over total and no amount is ever divided.
fn advanced_order(listing: &ListingDetail, data: &SeaportOrderData) -> AdvancedOrder {
	let fill_units = listing.quantity.max(1);
	let total_size = data.total_size.unwrap_or(fill_units);
	let offer: Vec<OfferItem> = if data.offer.is_empty() {
		let item_type = match listing.contract_kind {
			ContractKind::Erc721 => 2u8,
			ContractKind::Erc1155 => 3u8,
		};
		let amount = U256::from(total_size);
		vec![OfferItem {
			itemType: item_type,
			token: listing.contract,
			identifierOrCriteria: listing.token_id.unwrap_or_default(),
			startAmount: amount,
			endAmount: amount,
		}]
	} else {
		data.offer
			.iter()
			.map(|item| OfferItem {
				itemType: item.item_type,
				token: item.token,
				identifierOrCriteria: item.identifier_or_criteria,
				startAmount: item.start_amount,
				endAmount: item.end_amount,
			})
			.collect()
	};
	let consideration: Vec<ConsiderationItem> = if data.consideration.is_empty() {
		let item_type = if is_native(listing.currency) { 0u8 } else { 1u8 };
		vec![ConsiderationItem {
			itemType: item_type,
			token: if is_native(listing.currency) {
				Address::ZERO
			} else {
				listing.currency
			},
			identifierOrCriteria: U256::ZERO,
			startAmount: listing.price,
			endAmount: listing.price,
			recipient: listing.maker,
		}]
	} else {
		data.consideration
			.iter()
			.map(|item| ConsiderationItem {
				itemType: item.item_type,
				token: item.token,
				identifierOrCriteria: item.identifier_or_criteria,
				startAmount: item.start_amount,
				endAmount: item.end_amount,
				recipient: item.recipient,
			})
			.collect()
	};
	let (numerator, denominator) = match listing.contract_kind {
		ContractKind::Erc721 => (1u128, 1u128),
		ContractKind::Erc1155 => (u128::from(fill_units), u128::from(total_size.max(fill_units))),
	};
	AdvancedOrder {
		parameters: OrderParameters {
			offerer: data.offerer.unwrap_or(listing.maker),
			zone: data.zone,
			totalOriginalConsiderationItems: U256::from(consideration.len()),
			offer,
			consideration,
			orderType: data.order_type,
			startTime: U256::from(data.start_time),
			endTime: U256::from(data.end_time),
			zoneHash: data.zone_hash,
			salt: data.salt,
			conduitKey: data.conduit_key,
		},
		numerator: U120::from(numerator),
		denominator: U120::from(denominator),
		signature: data.signature.clone(),
		extraData: data.extra_data.clone(),
	}
}

pub struct SeaportAdapter;

impl ProtocolAdapter for SeaportAdapter {
	fn module_name(&self, kind: OrderKind) -> &'static str {
		match kind {
			OrderKind::SeaportV14 => "seaport-v1.4",
			OrderKind::SeaportV15 => "seaport-v1.5",
			OrderKind::SeaportV16 => "seaport-v1.6",
			OrderKind::Alienswap => "alienswap",
			_ => "seaport",
		}
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
		for listing in listings {
			let data: SeaportOrderData = parse_payload(listing)?;
			orders.push(advanced_order(listing, &data));
		}
		let total = bucket_total(listings);
		let currency = listings[0].currency;
		let (data, value) = if is_native(currency) {
			let call = ISeaportModule::acceptETHListingsCall {
				orders,
				params: native_params(params, total),
				fees: module_fees(fees),
			};
			(call.abi_encode(), total)
		} else {
			let call = ISeaportModule::acceptERC20ListingsCall {
				orders,
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

/// Tries to fill listings straight against the exchange, taker to contract.
/// Only viable when every payload parses and all orders share one conduit;
/// anything else returns `None` and the routed path takes over, which also
/// reports payload failures per listing.
pub(crate) fn attempt_direct_fill(
	exchange: Address,
	listings: &[&ListingDetail],
	taker: Address,
) -> Option<TxData> {
	let mut orders = Vec::with_capacity(listings.len());
	let mut total = U256::ZERO;
	let mut conduit: Option<B256> = None;
	for listing in listings {
		let data: SeaportOrderData = parse_payload(listing).ok()?;
		match conduit {
			Some(key) if key != data.conduit_key => return None,
			_ => conduit = Some(data.conduit_key),
		}
		orders.push(advanced_order(listing, &data));
		total = total.saturating_add(listing.price);
	}
	let data = if orders.len() == 1 {
		let call = ISeaportExchange::fulfillAdvancedOrderCall {
			advancedOrder: orders.pop()?,
			criteriaResolvers: vec![],
			fulfillerConduitKey: B256::ZERO,
			recipient: taker,
		};
		call.abi_encode()
	} else {
		let offer_fulfillments: Vec<Vec<FulfillmentComponent>> = (0..orders.len())
			.map(|i| {
				vec![FulfillmentComponent {
					orderIndex: U256::from(i),
					itemIndex: U256::ZERO,
				}]
			})
			.collect();
		// One component list per consideration item, no cross-order
		// aggregation. More transfers on-chain, but always valid.
		let consideration_fulfillments: Vec<Vec<FulfillmentComponent>> = orders
			.iter()
			.enumerate()
			.flat_map(|(i, order)| {
				(0..order.parameters.consideration.len()).map(move |j| {
					vec![FulfillmentComponent {
						orderIndex: U256::from(i),
						itemIndex: U256::from(j),
					}]
				})
			})
			.collect();
		let maximum = U256::from(orders.len());
		let call = ISeaportExchange::fulfillAvailableAdvancedOrdersCall {
			advancedOrders: orders,
			criteriaResolvers: vec![],
			offerFulfillments: offer_fulfillments,
			considerationFulfillments: consideration_fulfillments,
			fulfillerConduitKey: B256::ZERO,
			recipient: taker,
			maximumFulfilled: maximum,
		};
		call.abi_encode()
	};
	Some(TxData {
		from: taker,
		to: exchange,
		data: data.into(),
		value: total,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use aggregator_types::NATIVE_CURRENCY;
	use serde_json::json;

	fn listing(currency: Address, quantity: u64, price: u64) -> ListingDetail {
		ListingDetail {
			order_id: "order-1".to_string(),
			kind: OrderKind::SeaportV15,
			contract: Address::repeat_byte(0x11),
			contract_kind: ContractKind::Erc1155,
			token_id: Some(U256::from(7)),
			quantity,
			flagged: false,
			maker: Address::repeat_byte(0x22),
			source: Some("opensea.io".to_string()),
			currency,
			price: U256::from(price),
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
	fn test_sparse_payload_synthesizes_order_from_listing() {
		let mut l = listing(NATIVE_CURRENCY, 3, 3_000);
		l.fees.push(Fee {
			recipient: Address::repeat_byte(0x44),
			amount: U256::from(90),
		});
		let detail = &l;
		let fees = l.fees.clone();
		let exec = SeaportAdapter
			.build_fill(Address::repeat_byte(0xb2), &[detail], &fees, &params())
			.unwrap();
		assert_eq!(exec.value, U256::from(3_090));

		let call = ISeaportModule::acceptETHListingsCall::abi_decode(&exec.data).unwrap();
		assert_eq!(call.orders.len(), 1);
		let order = &call.orders[0];
		assert_eq!(order.parameters.offerer, l.maker);
		assert_eq!(order.parameters.offer.len(), 1);
		assert_eq!(order.parameters.offer[0].token, l.contract);
		assert_eq!(order.parameters.offer[0].endAmount, U256::from(3));
		assert_eq!(order.parameters.consideration[0].recipient, l.maker);
		assert_eq!(order.parameters.consideration[0].startAmount, U256::from(3_000));
		assert_eq!(order.numerator, 3);
		assert_eq!(order.denominator, 3);
		assert_eq!(call.params.amount, U256::from(3_090));
		assert!(call.params.revertIfIncomplete);
		assert_eq!(call.fees.len(), 1);
		assert_eq!(call.fees[0].amount, U256::from(90));
	}

	#[test]
	fn test_partial_fill_fraction_uses_payload_total_size() {
		let mut l = listing(NATIVE_CURRENCY, 2, 2_000);
		l.raw_data = json!({ "totalSize": 10, "signature": "0xbeef" });
		let exec = SeaportAdapter
			.build_fill(Address::repeat_byte(0xb2), &[&l], &[], &params())
			.unwrap();
		let call = ISeaportModule::acceptETHListingsCall::abi_decode(&exec.data).unwrap();
		assert_eq!(call.orders[0].numerator, 2);
		assert_eq!(call.orders[0].denominator, 10);
		assert_eq!(call.orders[0].signature, Bytes::from(vec![0xbe, 0xef]));
	}

	#[test]
	fn test_erc20_listing_encodes_token_and_zero_value() {
		let usdc = Address::repeat_byte(0x55);
		let l = listing(usdc, 1, 5_000);
		let exec = SeaportAdapter
			.build_fill(Address::repeat_byte(0xb2), &[&l], &[], &params())
			.unwrap();
		assert_eq!(exec.value, U256::ZERO);
		let call = ISeaportModule::acceptERC20ListingsCall::abi_decode(&exec.data).unwrap();
		assert_eq!(call.params.token, usdc);
		assert_eq!(call.params.amount, U256::from(5_000));
		assert_eq!(call.orders[0].parameters.consideration[0].itemType, 1);
		assert_eq!(call.orders[0].parameters.consideration[0].token, usdc);
	}

	#[test]
	fn test_direct_fill_targets_exchange_with_listing_price() {
		let l = listing(NATIVE_CURRENCY, 1, 1_000);
		let exchange = Address::repeat_byte(0xc2);
		let taker = Address::repeat_byte(0x33);
		let tx = attempt_direct_fill(exchange, &[&l], taker).unwrap();
		assert_eq!(tx.from, taker);
		assert_eq!(tx.to, exchange);
		assert_eq!(tx.value, U256::from(1_000));
		assert_eq!(
			&tx.data[..4],
			ISeaportExchange::fulfillAdvancedOrderCall::SELECTOR.as_slice()
		);
		let call = ISeaportExchange::fulfillAdvancedOrderCall::abi_decode(&tx.data).unwrap();
		assert_eq!(call.recipient, taker);
		assert!(call.criteriaResolvers.is_empty());
	}

	#[test]
	fn test_direct_fill_batches_same_conduit_orders() {
		let first = listing(NATIVE_CURRENCY, 1, 1_000);
		let mut second = listing(NATIVE_CURRENCY, 1, 500);
		second.order_id = "order-2".to_string();
		second.token_id = Some(U256::from(8));
		let tx = attempt_direct_fill(
			Address::repeat_byte(0xc2),
			&[&first, &second],
			Address::repeat_byte(0x33),
		)
		.unwrap();
		assert_eq!(tx.value, U256::from(1_500));
		let call =
			ISeaportExchange::fulfillAvailableAdvancedOrdersCall::abi_decode(&tx.data).unwrap();
		assert_eq!(call.advancedOrders.len(), 2);
		assert_eq!(call.offerFulfillments.len(), 2);
		assert_eq!(call.offerFulfillments[1][0].orderIndex, U256::from(1));
		assert_eq!(call.considerationFulfillments.len(), 2);
		assert_eq!(call.maximumFulfilled, U256::from(2));
	}

	#[test]
	fn test_direct_fill_rejects_mixed_conduits() {
		let first = listing(NATIVE_CURRENCY, 1, 1_000);
		let mut second = listing(NATIVE_CURRENCY, 1, 500);
		second.order_id = "order-2".to_string();
		second.raw_data = json!({
			"conduitKey": "0x1111111111111111111111111111111111111111111111111111111111111111"
		});
		assert!(attempt_direct_fill(
			Address::repeat_byte(0xc2),
			&[&first, &second],
			Address::repeat_byte(0x33),
		)
		.is_none());
	}

	#[test]
	fn test_malformed_payload_reports_order_id() {
		let mut l = listing(NATIVE_CURRENCY, 1, 1_000);
		l.raw_data = json!({ "offerer": 17 });
		let err = SeaportAdapter
			.build_fill(Address::repeat_byte(0xb2), &[&l], &[], &params())
			.unwrap_err();
		match err {
			RouterError::Payload { order_id, .. } => assert_eq!(order_id, "order-1"),
			other => panic!("unexpected error: {other}"),
		}
	}
}
