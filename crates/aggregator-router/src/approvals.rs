//! Currency approvals and EIP-2612 permits.
//!
//! Every ERC-20 pull the plan performs needs the approval proxy (or an
//! exchange, for dedicated fills) approved by the funds owner. Approvals are
//! never silently dropped: requirements from independent buckets are merged
//! by (currency, owner, operator) with their amounts summed.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};
use chrono::Utc;
use serde_json::json;

use aggregator_chain::{erc20_approve_calldata, ChainError, ChainReader};
use aggregator_types::{Approval, Permit, TxData};

sol! {
	interface IERC2612 {
		function nonces(address owner) external view returns (uint256);
		function name() external view returns (string);
	}
}

/// An approval requirement with its ready-to-send transaction.
pub(crate) fn approval_for(
	currency: Address,
	owner: Address,
	operator: Address,
	amount: U256,
) -> Approval {
	Approval {
		currency,
		owner,
		operator,
		amount,
		tx_data: TxData {
			from: owner,
			to: currency,
			data: erc20_approve_calldata(operator, amount),
			value: U256::ZERO,
		},
	}
}

/// Merges approvals sharing (currency, owner, operator), summing amounts.
/// Insertion order is preserved.
pub(crate) fn dedup_approvals(approvals: Vec<Approval>) -> Vec<Approval> {
	let mut merged: Vec<Approval> = Vec::with_capacity(approvals.len());
	for approval in approvals {
		if let Some(existing) = merged.iter_mut().find(|a| {
			a.currency == approval.currency
				&& a.owner == approval.owner
				&& a.operator == approval.operator
		}) {
			existing.amount = existing.amount.saturating_add(approval.amount);
			existing.tx_data.data = erc20_approve_calldata(existing.operator, existing.amount);
		} else {
			merged.push(approval);
		}
	}
	merged
}

/// Builds an EIP-2612 permit for the owner to sign instead of sending an
/// approval transaction.
///
/// The domain needs the token's `name()` and the owner's current `nonces()`
/// from chain state. Tokens that answer neither cannot be permitted; callers
/// fall back to a plain approval on any error here.
pub(crate) async fn build_permit(
	chain: &dyn ChainReader,
	chain_id: u64,
	currency: Address,
	owner: Address,
	spender: Address,
	amount: U256,
	deadline_secs: u64,
) -> Result<Permit, ChainError> {
	let ret = chain
		.call(currency, IERC2612::noncesCall { owner }.abi_encode().into())
		.await?;
	let nonce = IERC2612::noncesCall::abi_decode_returns(&ret)
		.map_err(|e| ChainError::Decode(e.to_string()))?;
	let ret = chain
		.call(currency, IERC2612::nameCall {}.abi_encode().into())
		.await?;
	let name = IERC2612::nameCall::abi_decode_returns(&ret)
		.map_err(|e| ChainError::Decode(e.to_string()))?;

	let deadline = Utc::now().timestamp().max(0) as u64 + deadline_secs;
	let typed_data = json!({
		"types": {
			"EIP712Domain": [
				{ "name": "name", "type": "string" },
				{ "name": "version", "type": "string" },
				{ "name": "chainId", "type": "uint256" },
				{ "name": "verifyingContract", "type": "address" }
			],
			"Permit": [
				{ "name": "owner", "type": "address" },
				{ "name": "spender", "type": "address" },
				{ "name": "value", "type": "uint256" },
				{ "name": "nonce", "type": "uint256" },
				{ "name": "deadline", "type": "uint256" }
			]
		},
		"primaryType": "Permit",
		"domain": {
			"name": name,
			"version": "1",
			"chainId": chain_id,
			"verifyingContract": currency,
		},
		"message": {
			"owner": owner,
			"spender": spender,
			"value": amount.to_string(),
			"nonce": nonce.to_string(),
			"deadline": deadline,
		}
	});
	Ok(Permit {
		currency,
		owner,
		spender,
		amount,
		deadline,
		typed_data,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::Bytes;
	use alloy_sol_types::SolValue;
	use async_trait::async_trait;

	#[test]
	fn test_approval_carries_matching_transaction() {
		let currency = Address::repeat_byte(0x55);
		let owner = Address::repeat_byte(0x33);
		let operator = Address::repeat_byte(0xa2);
		let approval = approval_for(currency, owner, operator, U256::from(700));
		assert_eq!(approval.tx_data.from, owner);
		assert_eq!(approval.tx_data.to, currency);
		assert_eq!(approval.tx_data.value, U256::ZERO);
		assert_eq!(
			approval.tx_data.data,
			erc20_approve_calldata(operator, U256::from(700))
		);
	}

	#[test]
	fn test_dedup_sums_matching_approvals_and_keeps_order() {
		let currency = Address::repeat_byte(0x55);
		let owner = Address::repeat_byte(0x33);
		let proxy = Address::repeat_byte(0xa2);
		let exchange = Address::repeat_byte(0xc6);
		let merged = dedup_approvals(vec![
			approval_for(currency, owner, proxy, U256::from(100)),
			approval_for(currency, owner, exchange, U256::from(50)),
			approval_for(currency, owner, proxy, U256::from(250)),
		]);
		assert_eq!(merged.len(), 2);
		assert_eq!(merged[0].operator, proxy);
		assert_eq!(merged[0].amount, U256::from(350));
		assert_eq!(
			merged[0].tx_data.data,
			erc20_approve_calldata(proxy, U256::from(350))
		);
		assert_eq!(merged[1].operator, exchange);
		assert_eq!(merged[1].amount, U256::from(50));
	}

	struct PermitReader;

	#[async_trait]
	impl ChainReader for PermitReader {
		async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes, ChainError> {
			if data.starts_with(&IERC2612::noncesCall::SELECTOR) {
				Ok(U256::from(5).abi_encode().into())
			} else if data.starts_with(&IERC2612::nameCall::SELECTOR) {
				Ok("Test Coin".to_string().abi_encode().into())
			} else {
				Err(ChainError::Unsupported("call"))
			}
		}

		async fn native_balance(&self, _owner: Address) -> Result<U256, ChainError> {
			Err(ChainError::Unsupported("native_balance"))
		}
	}

	#[tokio::test]
	async fn test_permit_reads_nonce_and_domain_from_chain() {
		let currency = Address::repeat_byte(0x55);
		let owner = Address::repeat_byte(0x33);
		let spender = Address::repeat_byte(0xa2);
		let permit = build_permit(&PermitReader, 1, currency, owner, spender, U256::from(900), 1_800)
			.await
			.unwrap();
		assert_eq!(permit.currency, currency);
		assert_eq!(permit.amount, U256::from(900));
		assert!(permit.deadline > 1_800);
		let message = &permit.typed_data["message"];
		assert_eq!(message["nonce"], "5");
		assert_eq!(message["value"], "900");
		assert_eq!(permit.typed_data["domain"]["name"], "Test Coin");
		assert_eq!(permit.typed_data["domain"]["chainId"], 1);
	}
}
