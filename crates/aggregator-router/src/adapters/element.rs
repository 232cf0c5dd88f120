//! Element fills. A 0x v4 fork; same per-standard entrypoint split.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use serde::Deserialize;

use aggregator_types::{is_native, ExecutionInfo, Fee, ListingDetail, OrderKind};

use super::{
	bucket_total, erc20_params, module_fees, native_params, parse_payload, ElementErc1155Order,
	ElementErc721Order, ElementFee, ElementSignature, FillParams, IElementModule, ProtocolAdapter,
};
use crate::RouterError;

const ETH_SENTINEL: Address = Address::repeat_byte(0xee);

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ElementOrderData {
	maker: Option<Address>,
	taker: Address,
	expiry: u64,
	nonce: U256,
	erc20_token: Option<Address>,
	erc20_token_amount: Option<U256>,
	nft_amount: Option<u128>,
	fees: Vec<ElementFeeData>,
	signature: ElementSignatureData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ElementFeeData {
	recipient: Address,
	amount: U256,
	fee_data: Bytes,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ElementSignatureData {
	signature_type: u8,
	v: u8,
	r: B256,
	s: B256,
}

impl Default for ElementSignatureData {
	fn default() -> Self {
		Self {
			signature_type: 0,
			v: 0,
			r: B256::ZERO,
			s: B256::ZERO,
		}
	}
}

fn payment_token(listing: &ListingDetail, data: &ElementOrderData) -> Address {
	data.erc20_token.unwrap_or(if is_native(listing.currency) {
		ETH_SENTINEL
	} else {
		listing.currency
	})
}

fn order_fees(data: &ElementOrderData) -> Vec<ElementFee> {
	data.fees
		.iter()
		.map(|fee| ElementFee {
			recipient: fee.recipient,
			amount: fee.amount,
			feeData: fee.fee_data.clone(),
		})
		.collect()
}

fn signature(data: &ElementOrderData) -> ElementSignature {
	ElementSignature {
		signatureType: data.signature.signature_type,
		v: data.signature.v,
		r: data.signature.r,
		s: data.signature.s,
	}
}

fn require_token_id(listing: &ListingDetail) -> Result<U256, RouterError> {
	listing.token_id.ok_or_else(|| RouterError::Payload {
		order_id: listing.order_id.clone(),
		message: "missing token id".to_string(),
	})
}

pub struct ElementAdapter;

impl ProtocolAdapter for ElementAdapter {
	fn module_name(&self, _kind: OrderKind) -> &'static str {
		"element"
	}

	fn bucket_name(&self, kind: OrderKind) -> &'static str {
		kind.as_str()
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
		let total = bucket_total(listings);
		let currency = listings[0].currency;
		let native = is_native(currency);
		let (data, value) = if listings[0].kind == OrderKind::ElementErc1155 {
			let mut orders = Vec::with_capacity(listings.len());
			let mut signatures = Vec::with_capacity(listings.len());
			let mut amounts = Vec::with_capacity(listings.len());
			for listing in listings {
				let payload: ElementOrderData = parse_payload(listing)?;
				let fill_units = u128::from(listing.quantity.max(1));
				let order_units = if payload.erc20_token_amount.is_some() {
					payload.nft_amount.unwrap_or(fill_units)
				} else {
					fill_units
				};
				orders.push(ElementErc1155Order {
					maker: payload.maker.unwrap_or(listing.maker),
					taker: payload.taker,
					expiry: U256::from(payload.expiry),
					nonce: payload.nonce,
					erc20Token: payment_token(listing, &payload),
					erc20TokenAmount: payload.erc20_token_amount.unwrap_or(listing.price),
					fees: order_fees(&payload),
					nft: listing.contract,
					nftId: require_token_id(listing)?,
					nftAmount: order_units.max(fill_units),
				});
				signatures.push(signature(&payload));
				amounts.push(fill_units);
			}
			if native {
				let call = IElementModule::acceptETHListingsERC1155Call {
					orders,
					signatures,
					amounts,
					params: native_params(params, total),
					fees: module_fees(fees),
				};
				(call.abi_encode(), total)
			} else {
				let call = IElementModule::acceptERC20ListingsERC1155Call {
					orders,
					signatures,
					amounts,
					params: erc20_params(params, currency, total),
					fees: module_fees(fees),
				};
				(call.abi_encode(), U256::ZERO)
			}
		} else {
			let mut orders = Vec::with_capacity(listings.len());
			let mut signatures = Vec::with_capacity(listings.len());
			for listing in listings {
				let payload: ElementOrderData = parse_payload(listing)?;
				orders.push(ElementErc721Order {
					maker: payload.maker.unwrap_or(listing.maker),
					taker: payload.taker,
					expiry: U256::from(payload.expiry),
					nonce: payload.nonce,
					erc20Token: payment_token(listing, &payload),
					erc20TokenAmount: payload.erc20_token_amount.unwrap_or(listing.price),
					fees: order_fees(&payload),
					nft: listing.contract,
					nftId: require_token_id(listing)?,
				});
				signatures.push(signature(&payload));
			}
			if native {
				let call = IElementModule::acceptETHListingsERC721Call {
					orders,
					signatures,
					params: native_params(params, total),
					fees: module_fees(fees),
				};
				(call.abi_encode(), total)
			} else {
				let call = IElementModule::acceptERC20ListingsERC721Call {
					orders,
					signatures,
					params: erc20_params(params, currency, total),
					fees: module_fees(fees),
				};
				(call.abi_encode(), U256::ZERO)
			}
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
	use serde_json::json;

	#[test]
	fn test_erc721_fill_completes_sparse_payload() {
		let l = ListingDetail {
			order_id: "el-1".to_string(),
			kind: OrderKind::ElementErc721,
			contract: Address::repeat_byte(0x11),
			contract_kind: ContractKind::Erc721,
			token_id: Some(U256::from(42)),
			quantity: 1,
			flagged: false,
			maker: Address::repeat_byte(0x22),
			source: None,
			currency: NATIVE_CURRENCY,
			price: U256::from(1_500),
			fees: vec![],
			raw_data: json!({ "nonce": "9" }),
		};
		let exec = ElementAdapter
			.build_fill(
				Address::repeat_byte(0xb7),
				&[&l],
				&[],
				&FillParams {
					fill_to: Address::repeat_byte(0x33),
					refund_to: Address::repeat_byte(0x33),
					revert_if_incomplete: true,
				},
			)
			.unwrap();
		assert_eq!(exec.value, U256::from(1_500));
		let call = IElementModule::acceptETHListingsERC721Call::abi_decode(&exec.data).unwrap();
		assert_eq!(call.orders[0].maker, l.maker);
		assert_eq!(call.orders[0].nftId, U256::from(42));
		assert_eq!(call.orders[0].nonce, U256::from(9));
		assert_eq!(call.orders[0].erc20Token, ETH_SENTINEL);
	}
}
