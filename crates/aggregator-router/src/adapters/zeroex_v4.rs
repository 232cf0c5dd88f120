//! 0x v4 fills.
//!
//! The module exposes separate entrypoints per token standard, so 721 and
//! 1155 listings bucket separately even though they share one module.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use serde::Deserialize;

use aggregator_types::{is_native, ExecutionInfo, Fee, ListingDetail, OrderKind};

use super::{
	bucket_total, erc20_params, module_fees, native_params, parse_payload, FillParams,
	IZeroexV4Module, ProtocolAdapter, ZeroexErc1155Order, ZeroexErc721Order, ZeroexFee,
	ZeroexSignature,
};
use crate::RouterError;

/// 0x represents the native currency with this sentinel token address.
const ETH_SENTINEL: Address = Address::repeat_byte(0xee);

/// Stored order payload. `erc20TokenAmount` and `nftAmount` describe the
/// order-wide totals; when the payload omits them the listing is treated as
/// the whole order, which keeps every amount exact without division.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ZeroexOrderData {
	maker: Option<Address>,
	taker: Address,
	expiry: u64,
	nonce: U256,
	erc20_token: Option<Address>,
	erc20_token_amount: Option<U256>,
	nft_amount: Option<u128>,
	fees: Vec<ZeroexFeeData>,
	signature: ZeroexSignatureData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ZeroexFeeData {
	recipient: Address,
	amount: U256,
	fee_data: Bytes,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ZeroexSignatureData {
	signature_type: u8,
	v: u8,
	r: B256,
	s: B256,
}

impl Default for ZeroexSignatureData {
	fn default() -> Self {
		// signatureType 2 is EIP-712.
		Self {
			signature_type: 2,
			v: 0,
			r: B256::ZERO,
			s: B256::ZERO,
		}
	}
}

fn payment_token(listing: &ListingDetail, data: &ZeroexOrderData) -> Address {
	data.erc20_token.unwrap_or(if is_native(listing.currency) {
		ETH_SENTINEL
	} else {
		listing.currency
	})
}

fn order_fees(data: &ZeroexOrderData) -> Vec<ZeroexFee> {
	data.fees
		.iter()
		.map(|fee| ZeroexFee {
			recipient: fee.recipient,
			amount: fee.amount,
			feeData: fee.fee_data.clone(),
		})
		.collect()
}

fn signature(data: &ZeroexOrderData) -> ZeroexSignature {
	ZeroexSignature {
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

fn erc721_order(
	listing: &ListingDetail,
	data: &ZeroexOrderData,
) -> Result<ZeroexErc721Order, RouterError> {
	Ok(ZeroexErc721Order {
		// direction 0 is a sell order.
		direction: 0,
		maker: data.maker.unwrap_or(listing.maker),
		taker: data.taker,
		expiry: U256::from(data.expiry),
		nonce: data.nonce,
		erc20Token: payment_token(listing, data),
		erc20TokenAmount: data.erc20_token_amount.unwrap_or(listing.price),
		fees: order_fees(data),
		erc721Token: listing.contract,
		erc721TokenId: require_token_id(listing)?,
		erc721TokenProperties: vec![],
	})
}

fn erc1155_order(
	listing: &ListingDetail,
	data: &ZeroexOrderData,
) -> Result<ZeroexErc1155Order, RouterError> {
	let fill_units = u128::from(listing.quantity.max(1));
	let order_units = if data.erc20_token_amount.is_some() {
		data.nft_amount.unwrap_or(fill_units)
	} else {
		fill_units
	};
	Ok(ZeroexErc1155Order {
		direction: 0,
		maker: data.maker.unwrap_or(listing.maker),
		taker: data.taker,
		expiry: U256::from(data.expiry),
		nonce: data.nonce,
		erc20Token: payment_token(listing, data),
		erc20TokenAmount: data.erc20_token_amount.unwrap_or(listing.price),
		fees: order_fees(data),
		erc1155Token: listing.contract,
		erc1155TokenId: require_token_id(listing)?,
		erc1155TokenProperties: vec![],
		erc1155TokenAmount: order_units.max(fill_units),
	})
}

pub struct ZeroexV4Adapter;

impl ProtocolAdapter for ZeroexV4Adapter {
	fn module_name(&self, _kind: OrderKind) -> &'static str {
		"zeroex-v4"
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
		let (data, value) = if listings[0].kind == OrderKind::ZeroexV4Erc1155 {
			let mut orders = Vec::with_capacity(listings.len());
			let mut signatures = Vec::with_capacity(listings.len());
			let mut amounts = Vec::with_capacity(listings.len());
			for listing in listings {
				let payload: ZeroexOrderData = parse_payload(listing)?;
				orders.push(erc1155_order(listing, &payload)?);
				signatures.push(signature(&payload));
				amounts.push(u128::from(listing.quantity.max(1)));
			}
			if native {
				let call = IZeroexV4Module::acceptETHListingsERC1155Call {
					orders,
					signatures,
					amounts,
					params: native_params(params, total),
					fees: module_fees(fees),
				};
				(call.abi_encode(), total)
			} else {
				let call = IZeroexV4Module::acceptERC20ListingsERC1155Call {
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
				let payload: ZeroexOrderData = parse_payload(listing)?;
				orders.push(erc721_order(listing, &payload)?);
				signatures.push(signature(&payload));
			}
			if native {
				let call = IZeroexV4Module::acceptETHListingsERC721Call {
					orders,
					signatures,
					params: native_params(params, total),
					fees: module_fees(fees),
				};
				(call.abi_encode(), total)
			} else {
				let call = IZeroexV4Module::acceptERC20ListingsERC721Call {
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
