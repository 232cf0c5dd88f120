//! Dedicated-transaction fills.
//!
//! Foundation, SuperRare and Manifold reject contract-mediated fills, so
//! each of their listings becomes one taker transaction straight against the
//! exchange. The exchange cannot disburse on-top payouts, so listings
//! carrying fees are rejected rather than under-paying them.

use alloy_primitives::{
	aliases::{U24, U40},
	Address, U256,
};
use alloy_sol_types::{sol, SolCall};
use serde::Deserialize;

use aggregator_config::AddressBook;
use aggregator_types::{is_native, FillTx, ListingDetail, OrderKind, TxData};

use crate::adapters::parse_payload;
use crate::approvals::approval_for;
use crate::RouterError;

sol! {
	interface IFoundationMarket {
		function buyV2(
			address nftContract,
			uint256 tokenId,
			uint256 maxPrice,
			address referrer
		) external payable;
	}

	interface ISuperRareBazaar {
		function buy(
			address originContract,
			uint256 tokenId,
			address currency,
			uint256 amount
		) external payable;
	}

	interface IManifoldMarketplace {
		function purchase(uint40 listingId, uint24 count) external payable;
	}
}

/// Manifold fills address the marketplace listing, not the token, so the
/// listing id cannot be derived and must travel in the payload.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ManifoldOrderData {
	listing_id: Option<u64>,
}

fn require_token_id(listing: &ListingDetail) -> Result<U256, RouterError> {
	listing.token_id.ok_or_else(|| RouterError::Payload {
		order_id: listing.order_id.clone(),
		message: "missing token id".to_string(),
	})
}

pub(crate) fn build_dedicated_tx(
	book: &AddressBook,
	listing: &ListingDetail,
	taker: Address,
) -> Result<FillTx, RouterError> {
	if !listing.fees.is_empty() {
		return Err(RouterError::Fees(listing.kind));
	}
	let exchange = book
		.exchange(listing.kind.as_str())
		.ok_or(RouterError::MissingExchange(listing.kind.as_str()))?;

	let mut approvals = Vec::new();
	let (data, value) = match listing.kind {
		OrderKind::Foundation => {
			if !is_native(listing.currency) {
				return Err(RouterError::Currency {
					kind: listing.kind,
					currency: listing.currency,
				});
			}
			let call = IFoundationMarket::buyV2Call {
				nftContract: listing.contract,
				tokenId: require_token_id(listing)?,
				maxPrice: listing.price,
				referrer: Address::ZERO,
			};
			(call.abi_encode(), listing.price)
		}
		OrderKind::SuperRare => {
			let native = is_native(listing.currency);
			let call = ISuperRareBazaar::buyCall {
				originContract: listing.contract,
				tokenId: require_token_id(listing)?,
				currency: if native {
					Address::ZERO
				} else {
					listing.currency
				},
				amount: listing.price,
			};
			if native {
				(call.abi_encode(), listing.price)
			} else {
				approvals.push(approval_for(listing.currency, taker, exchange, listing.price));
				(call.abi_encode(), U256::ZERO)
			}
		}
		OrderKind::Manifold => {
			if !is_native(listing.currency) {
				return Err(RouterError::Currency {
					kind: listing.kind,
					currency: listing.currency,
				});
			}
			let payload: ManifoldOrderData = parse_payload(listing)?;
			let listing_id = payload.listing_id.ok_or_else(|| RouterError::Payload {
				order_id: listing.order_id.clone(),
				message: "missing manifold listing id".to_string(),
			})?;
			let call = IManifoldMarketplace::purchaseCall {
				listingId: U40::from(listing_id),
				count: U24::from(listing.quantity.max(1).min(u64::from(u32::MAX)) as u32),
			};
			(call.abi_encode(), listing.price)
		}
		other => return Err(RouterError::Unsupported(other)),
	};

	Ok(FillTx {
		tx_data: TxData {
			from: taker,
			to: exchange,
			data: data.into(),
			value,
		},
		order_ids: vec![listing.order_id.clone()],
		approvals,
		permits: vec![],
	})
}
