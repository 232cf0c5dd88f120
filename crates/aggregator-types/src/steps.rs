//! Client-facing execution steps.
//!
//! The aggregator never submits transactions itself. Instead it hands the
//! client an ordered list of steps (sign this, send that) whose order is
//! fixed: authentication first, then currency approvals or permits, then
//! marketplace pre-signatures, then auth transactions, then the sales.

use serde::{Deserialize, Serialize};

use crate::common::OrderId;

/// Stable step identifiers, in their required execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepId {
	Auth,
	CurrencyApproval,
	CurrencyPermit,
	PreSignature,
	AuthTransaction,
	Sale,
}

impl StepId {
	/// All step ids in execution order.
	pub const ORDERED: [StepId; 6] = [
		StepId::Auth,
		StepId::CurrencyApproval,
		StepId::CurrencyPermit,
		StepId::PreSignature,
		StepId::AuthTransaction,
		StepId::Sale,
	];
}

/// What the client has to do for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
	/// Sign a message or typed data.
	Signature,
	/// Send a transaction.
	Transaction,
}

/// Completion state of a step item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
	Complete,
	Incomplete,
}

/// How the client can poll whether an incomplete item has taken effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDescriptor {
	/// Endpoint to poll.
	pub endpoint: String,
	/// HTTP method to use.
	pub method: String,
	/// Request body, when the poll is a POST.
	#[serde(default)]
	pub body: Option<serde_json::Value>,
}

/// One unit of work within a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepItem {
	/// Whether the item still needs client action.
	pub status: ItemStatus,
	/// Orders this item unblocks.
	#[serde(default, rename = "orderIds")]
	pub order_ids: Vec<OrderId>,
	/// Payload to sign or transaction to send.
	#[serde(default)]
	pub data: Option<serde_json::Value>,
	/// Poll descriptor for incomplete items.
	#[serde(default)]
	pub check: Option<CheckDescriptor>,
}

/// An ordered step of the buy flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteStep {
	/// Stable identifier.
	pub id: StepId,
	/// Short action label shown to the user.
	pub action: String,
	/// One-sentence description of the step.
	pub description: String,
	/// Signature or transaction.
	pub kind: StepKind,
	/// Work items, empty steps are filtered out before returning.
	pub items: Vec<StepItem>,
}

/// Where the buy flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowState {
	/// Off-chain authentication is missing; only the auth step is returned.
	AwaitingAuth,
	/// The plan is complete and ready to execute.
	Ready,
}
