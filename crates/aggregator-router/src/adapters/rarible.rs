//! Rarible fills.
//!
//! Rarible orders describe both sides as tagged assets; the tag is the first
//! four bytes of the keccak hash of the class name.

use alloy_primitives::{keccak256, Address, Bytes, FixedBytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use serde::Deserialize;

use aggregator_types::{is_native, ContractKind, ExecutionInfo, Fee, ListingDetail, OrderKind};

use super::{
	bucket_total, erc20_params, module_fees, native_params, parse_payload, FillParams,
	IRaribleModule, ProtocolAdapter, RaribleAsset, RaribleAssetType, RaribleOrder,
};
use crate::RouterError;

fn class_tag(name: &str) -> FixedBytes<4> {
	FixedBytes::<4>::from_slice(&keccak256(name.as_bytes())[..4])
}

/// Marker for orders that carry no side data.
fn no_data_tag() -> FixedBytes<4> {
	FixedBytes::<4>::from([0xff, 0xff, 0xff, 0xff])
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RaribleOrderData {
	maker: Option<Address>,
	salt: U256,
	start: u64,
	end: u64,
	/// Order data revision tag, e.g. "V2".
	data_type: Option<String>,
	data: Bytes,
	signature: Bytes,
}

fn rarible_order(listing: &ListingDetail, data: &RaribleOrderData) -> RaribleOrder {
	let nft_class = match listing.contract_kind {
		ContractKind::Erc721 => "ERC721",
		ContractKind::Erc1155 => "ERC1155",
	};
	let make_asset = RaribleAsset {
		assetType: RaribleAssetType {
			assetClass: class_tag(nft_class),
			data: (listing.contract, listing.token_id.unwrap_or_default())
				.abi_encode()
				.into(),
		},
		value: U256::from(listing.quantity.max(1)),
	};
	let take_asset = if is_native(listing.currency) {
		RaribleAsset {
			assetType: RaribleAssetType {
				assetClass: class_tag("ETH"),
				data: Bytes::new(),
			},
			value: listing.price,
		}
	} else {
		RaribleAsset {
			assetType: RaribleAssetType {
				assetClass: class_tag("ERC20"),
				data: listing.currency.abi_encode().into(),
			},
			value: listing.price,
		}
	};
	let data_type = match &data.data_type {
		Some(tag) => class_tag(tag),
		None if data.data.is_empty() => no_data_tag(),
		None => class_tag("V2"),
	};
	RaribleOrder {
		maker: data.maker.unwrap_or(listing.maker),
		makeAsset: make_asset,
		taker: Address::ZERO,
		takeAsset: take_asset,
		salt: data.salt,
		start: U256::from(data.start),
		end: U256::from(data.end),
		dataType: data_type,
		data: data.data.clone(),
	}
}

pub struct RaribleAdapter;

impl ProtocolAdapter for RaribleAdapter {
	fn module_name(&self, _kind: OrderKind) -> &'static str {
		"rarible"
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
			let data: RaribleOrderData = parse_payload(listing)?;
			orders.push(rarible_order(listing, &data));
			signatures.push(data.signature);
		}
		let total = bucket_total(listings);
		let currency = listings[0].currency;
		let (data, value) = if is_native(currency) {
			let call = IRaribleModule::acceptETHListingsCall {
				orders,
				signatures,
				params: native_params(params, total),
				fees: module_fees(fees),
			};
			(call.abi_encode(), total)
		} else {
			let call = IRaribleModule::acceptERC20ListingsCall {
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
