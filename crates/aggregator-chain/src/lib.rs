//! On-chain state reads.
//!
//! Planning needs a handful of views: currency balances, allowances and NFT
//! ownership. The [`ChainReader`] trait exposes two primitives (`call` and
//! `native_balance`); the typed helpers are default methods built on top of
//! ABI-encoded view calls, so backends only implement the primitives.

use async_trait::async_trait;
use thiserror::Error;

use aggregator_types::{is_native, ContractKind};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

/// Re-export implementations
pub mod implementations {
	pub mod rpc;
	pub mod static_chain;
}

sol! {
	interface IERC20 {
		function balanceOf(address owner) external view returns (uint256);
		function allowance(address owner, address spender) external view returns (uint256);
		function approve(address spender, uint256 amount) external returns (bool);
	}

	interface IERC721 {
		function ownerOf(uint256 tokenId) external view returns (address);
	}

	interface IERC1155 {
		function balanceOf(address owner, uint256 id) external view returns (uint256);
	}
}

/// Errors that can occur while reading chain state.
#[derive(Debug, Error)]
pub enum ChainError {
	/// The RPC endpoint returned an error.
	#[error("RPC error: {0}")]
	Rpc(String),
	/// The request never reached the endpoint.
	#[error("Transport error: {0}")]
	Transport(String),
	/// The response could not be ABI-decoded.
	#[error("Decode error: {0}")]
	Decode(String),
	/// The backend does not support this operation.
	#[error("Unsupported operation: {0}")]
	Unsupported(&'static str),
}

/// Read access to on-chain state.
#[async_trait]
pub trait ChainReader: Send + Sync {
	/// Executes a read-only contract call and returns the raw return data.
	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

	/// Native currency balance of `owner`.
	async fn native_balance(&self, owner: Address) -> Result<U256, ChainError>;

	/// ERC-20 balance of `owner`.
	async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
		let data = IERC20::balanceOfCall { owner }.abi_encode();
		let ret = self.call(token, data.into()).await?;
		IERC20::balanceOfCall::abi_decode_returns(&ret)
			.map_err(|e| ChainError::Decode(e.to_string()))
	}

	/// ERC-20 allowance granted by `owner` to `spender`.
	async fn erc20_allowance(
		&self,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, ChainError> {
		let data = IERC20::allowanceCall { owner, spender }.abi_encode();
		let ret = self.call(token, data.into()).await?;
		IERC20::allowanceCall::abi_decode_returns(&ret)
			.map_err(|e| ChainError::Decode(e.to_string()))
	}

	/// Current owner of an ERC-721 token.
	async fn erc721_owner(&self, contract: Address, token_id: U256) -> Result<Address, ChainError> {
		let data = IERC721::ownerOfCall { tokenId: token_id }.abi_encode();
		let ret = self.call(contract, data.into()).await?;
		IERC721::ownerOfCall::abi_decode_returns(&ret)
			.map_err(|e| ChainError::Decode(e.to_string()))
	}

	/// ERC-1155 balance of `owner` for one token id.
	async fn erc1155_balance(
		&self,
		contract: Address,
		owner: Address,
		token_id: U256,
	) -> Result<U256, ChainError> {
		let data = IERC1155::balanceOfCall {
			owner,
			id: token_id,
		}
		.abi_encode();
		let ret = self.call(contract, data.into()).await?;
		IERC1155::balanceOfCall::abi_decode_returns(&ret)
			.map_err(|e| ChainError::Decode(e.to_string()))
	}

	/// Units of a token held by `owner`, across both NFT standards.
	async fn nft_balance(
		&self,
		kind: ContractKind,
		contract: Address,
		owner: Address,
		token_id: U256,
	) -> Result<U256, ChainError> {
		match kind {
			ContractKind::Erc721 => {
				let holder = self.erc721_owner(contract, token_id).await?;
				Ok(if holder == owner {
					U256::from(1)
				} else {
					U256::ZERO
				})
			}
			ContractKind::Erc1155 => self.erc1155_balance(contract, owner, token_id).await,
		}
	}

	/// Balance of `owner` in an arbitrary payment currency.
	async fn currency_balance(
		&self,
		currency: Address,
		owner: Address,
	) -> Result<U256, ChainError> {
		if is_native(currency) {
			self.native_balance(owner).await
		} else {
			self.erc20_balance(currency, owner).await
		}
	}
}

/// Builds ERC-20 `approve` calldata, used for approval transactions.
pub fn erc20_approve_calldata(spender: Address, amount: U256) -> Bytes {
	IERC20::approveCall { spender, amount }.abi_encode().into()
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_sol_types::SolValue;

	/// Answers typed view calls by selector with canned values, exercising
	/// the default helpers' encode/decode round trip.
	struct SelectorReader;

	#[async_trait]
	impl ChainReader for SelectorReader {
		async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes, ChainError> {
			let selector: [u8; 4] = data[..4].try_into().unwrap();
			let ret = match selector {
				IERC20::balanceOfCall::SELECTOR => U256::from(100u64).abi_encode(),
				IERC20::allowanceCall::SELECTOR => U256::from(50u64).abi_encode(),
				IERC721::ownerOfCall::SELECTOR => Address::repeat_byte(0x11).abi_encode(),
				IERC1155::balanceOfCall::SELECTOR => U256::from(7u64).abi_encode(),
				_ => return Err(ChainError::Unsupported("unknown selector")),
			};
			Ok(ret.into())
		}

		async fn native_balance(&self, _owner: Address) -> Result<U256, ChainError> {
			Ok(U256::from(1_000u64))
		}
	}

	#[tokio::test]
	async fn test_typed_helpers_round_trip() {
		let reader = SelectorReader;
		let token = Address::repeat_byte(0xaa);
		let owner = Address::repeat_byte(0x11);
		let other = Address::repeat_byte(0x22);

		assert_eq!(
			reader.erc20_balance(token, owner).await.unwrap(),
			U256::from(100u64)
		);
		assert_eq!(
			reader.erc20_allowance(token, owner, other).await.unwrap(),
			U256::from(50u64)
		);
		assert_eq!(
			reader.erc721_owner(token, U256::from(1)).await.unwrap(),
			owner
		);
		assert_eq!(
			reader
				.erc1155_balance(token, owner, U256::from(1))
				.await
				.unwrap(),
			U256::from(7u64)
		);
	}

	#[tokio::test]
	async fn test_nft_balance_dispatches_by_kind() {
		let reader = SelectorReader;
		let contract = Address::repeat_byte(0xaa);
		let holder = Address::repeat_byte(0x11);
		let stranger = Address::repeat_byte(0x99);

		let held = reader
			.nft_balance(ContractKind::Erc721, contract, holder, U256::from(1))
			.await
			.unwrap();
		assert_eq!(held, U256::from(1));

		let not_held = reader
			.nft_balance(ContractKind::Erc721, contract, stranger, U256::from(1))
			.await
			.unwrap();
		assert_eq!(not_held, U256::ZERO);

		let stacked = reader
			.nft_balance(ContractKind::Erc1155, contract, holder, U256::from(1))
			.await
			.unwrap();
		assert_eq!(stacked, U256::from(7));
	}

	#[tokio::test]
	async fn test_currency_balance_prefers_native() {
		let reader = SelectorReader;
		let owner = Address::repeat_byte(0x11);
		assert_eq!(
			reader
				.currency_balance(Address::ZERO, owner)
				.await
				.unwrap(),
			U256::from(1_000u64)
		);
		assert_eq!(
			reader
				.currency_balance(Address::repeat_byte(0xaa), owner)
				.await
				.unwrap(),
			U256::from(100u64)
		);
	}
}
