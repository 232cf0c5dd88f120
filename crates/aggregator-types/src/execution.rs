//! Execution plan types produced by the planner.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::{u256_string, OrderId, TxData};
use crate::errors::FillError;

/// One module call inside the router's multicall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionInfo {
	/// Fill module receiving the call.
	pub module: Address,
	/// ABI-encoded module calldata.
	pub data: Bytes,
	/// Native value forwarded with the call.
	#[serde(with = "u256_string")]
	pub value: U256,
}

/// An ERC-20 approval required before a fill transaction can succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
	/// Token being approved.
	pub currency: Address,
	/// Token owner granting the approval.
	pub owner: Address,
	/// Contract being approved to spend.
	pub operator: Address,
	/// Amount to approve.
	#[serde(with = "u256_string")]
	pub amount: U256,
	/// Ready-to-send approval transaction.
	#[serde(rename = "txData")]
	pub tx_data: TxData,
}

/// An EIP-2612 permit replacing an approval transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permit {
	/// Token being permitted.
	pub currency: Address,
	/// Token owner signing the permit.
	pub owner: Address,
	/// Contract allowed to spend.
	pub spender: Address,
	/// Amount permitted.
	#[serde(with = "u256_string")]
	pub amount: U256,
	/// Unix timestamp the permit expires at.
	pub deadline: u64,
	/// EIP-712 typed data the owner must sign.
	#[serde(rename = "typedData")]
	pub typed_data: serde_json::Value,
}

/// An off-chain signature a marketplace requires before releasing calldata
/// or accepting a fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreSignature {
	/// Orders gated behind this signature.
	#[serde(rename = "orderIds")]
	pub order_ids: Vec<OrderId>,
	/// Message payload to sign.
	pub message: serde_json::Value,
}

/// One fill transaction of the execution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillTx {
	/// The transaction itself.
	#[serde(rename = "txData")]
	pub tx_data: TxData,
	/// Orders this transaction fills.
	#[serde(rename = "orderIds")]
	pub order_ids: Vec<OrderId>,
	/// ERC-20 approvals that must be in place first.
	#[serde(default)]
	pub approvals: Vec<Approval>,
	/// Permits replacing approvals when permit mode is on.
	#[serde(default)]
	pub permits: Vec<Permit>,
}

/// A per-order failure surfaced alongside a (possibly partial) plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderError {
	/// Order the failure applies to, when order-scoped.
	#[serde(rename = "orderId")]
	pub order_id: Option<OrderId>,
	/// Human-readable failure description.
	pub message: String,
	/// Stable machine-readable code, see [`FillError::code`].
	pub code: String,
	/// Whether retrying could succeed.
	pub unrecoverable: bool,
}

impl OrderError {
	/// Builds an entry from a fill error, capturing its retry semantics.
	pub fn from_error(order_id: Option<OrderId>, error: &FillError) -> Self {
		OrderError {
			order_id,
			message: error.to_string(),
			code: error.code().to_string(),
			unrecoverable: error.is_unrecoverable(),
		}
	}
}

/// Complete output of execution planning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FillOutput {
	/// Fill transactions in submission order. Swap transactions are part of
	/// the fill transactions themselves; this order is final.
	pub txs: Vec<FillTx>,
	/// Per-order outcome: true when covered by some transaction in `txs`.
	pub success: HashMap<OrderId, bool>,
	/// Orders that fell out of the plan, with reasons.
	#[serde(default)]
	pub errors: Vec<OrderError>,
	/// Marketplace signatures required before the plan can execute.
	#[serde(default, rename = "preSignatures")]
	pub pre_signatures: Vec<PreSignature>,
	/// On-chain registrations required before the sale transactions.
	#[serde(default, rename = "authTransactions")]
	pub auth_transactions: Vec<TxData>,
}

impl FillOutput {
	/// Marks every order of `ids` as planned or failed.
	pub fn record_outcome(&mut self, ids: &[OrderId], planned: bool) {
		for id in ids {
			self.success.insert(id.clone(), planned);
		}
	}
}
