//! CryptoPunks fills. Pre-ERC-721 contract, native currency only.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

use aggregator_types::{ExecutionInfo, Fee, ListingDetail, OrderKind};

use super::{
	bucket_total, module_fees, native_params, require_native, FillParams, IPunksModule,
	ProtocolAdapter,
};
use crate::RouterError;

pub struct CryptopunksAdapter;

impl ProtocolAdapter for CryptopunksAdapter {
	fn module_name(&self, _kind: OrderKind) -> &'static str {
		"cryptopunks"
	}

	fn build_fill(
		&self,
		module: Address,
		listings: &[&ListingDetail],
		fees: &[Fee],
		params: &FillParams,
	) -> Result<ExecutionInfo, RouterError> {
		require_native(listings[0].kind, listings[0].currency)?;
		let mut punk_indexes = Vec::with_capacity(listings.len());
		for listing in listings {
			let index = listing.token_id.ok_or_else(|| RouterError::Payload {
				order_id: listing.order_id.clone(),
				message: "missing punk index".to_string(),
			})?;
			punk_indexes.push(index);
		}
		let total = bucket_total(listings);
		let call = IPunksModule::buyPunksCall {
			punkIndexes: punk_indexes,
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
