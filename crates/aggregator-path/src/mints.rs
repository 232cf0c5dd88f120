//! Mint stage eligibility.
//!
//! Open mints compete with secondary listings when a collection item is
//! filled. A stage only qualifies for a specific wallet: allowlists, per
//! wallet caps and the stage lifecycle all gate how many units the wallet
//! can still mint.

use alloy_primitives::{Address, U256};

use aggregator_types::{
	is_native, MintDetail, MintStageKind, MintStatus, OpenMint, OrderId,
};

/// Why a mint stage cannot serve a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintIneligibility {
	/// The stage is not currently open.
	StageClosed,
	/// The stage settles in a currency mints cannot be paid in.
	UnsupportedCurrency,
	/// Allowlist stage and the wallet is not on the list.
	NotAllowlisted,
	/// The wallet has already minted its cap on this collection.
	WalletCapReached,
}

impl MintIneligibility {
	/// Stable string form for logs.
	pub fn as_str(&self) -> &'static str {
		match self {
			MintIneligibility::StageClosed => "stage-closed",
			MintIneligibility::UnsupportedCurrency => "unsupported-currency",
			MintIneligibility::NotAllowlisted => "not-allowlisted",
			MintIneligibility::WalletCapReached => "wallet-cap-reached",
		}
	}
}

/// Units `wallet` may still mint from a stage, given how many units it has
/// already minted on the collection (on-chain history plus this pass).
///
/// Stages minting one fixed token are capped at a single unit regardless of
/// the requested quantity.
pub fn wallet_capacity(
	mint: &OpenMint,
	wallet: Address,
	already_minted: u64,
) -> Result<u64, MintIneligibility> {
	if mint.status != MintStatus::Open {
		return Err(MintIneligibility::StageClosed);
	}
	if !is_native(mint.currency) {
		return Err(MintIneligibility::UnsupportedCurrency);
	}
	if mint.kind == MintStageKind::Allowlist
		&& !mint
			.allowlist
			.as_deref()
			.unwrap_or_default()
			.contains(&wallet)
	{
		return Err(MintIneligibility::NotAllowlisted);
	}

	let mut capacity = match mint.max_mints_per_wallet {
		Some(cap) => cap.saturating_sub(already_minted),
		None => u64::MAX,
	};
	if mint.token_id.is_some() {
		capacity = capacity.min(1);
	}
	if capacity == 0 {
		return Err(MintIneligibility::WalletCapReached);
	}
	Ok(capacity)
}

/// Synthetic path id shared by all mint fills of a collection.
pub fn mint_order_id(collection: &str) -> OrderId {
	format!("mint:{collection}")
}

/// Builds the detail record for minting `quantity` units from a stage.
pub fn mint_detail(mint: &OpenMint, quantity: u64) -> MintDetail {
	MintDetail {
		collection: mint.collection.clone(),
		contract: mint.contract,
		stage: mint.stage.clone(),
		token_id: mint.token_id,
		quantity,
		price: mint.price.saturating_mul(U256::from(quantity)),
		currency: mint.currency,
		tx_template: mint.tx_template.clone(),
	}
}
