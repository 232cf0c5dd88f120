//! The shared fill error taxonomy.
//!
//! Every failure surfaced while building a path or compiling an execution
//! plan collapses into [`FillError`]. The distinction that matters
//! operationally is request-scoped versus order-scoped, and for order-scoped
//! failures whether a retry could ever succeed.

use alloy_primitives::Address;
use thiserror::Error;

use crate::common::OrderId;

/// Failure modes of path building and execution planning.
#[derive(Debug, Clone, Error)]
pub enum FillError {
	/// The request itself is malformed.
	#[error("invalid request: {0}")]
	Validation(String),

	/// Nothing matching the request could be filled at all.
	#[error("no fillable orders")]
	NoFillableOrders,

	/// Less inventory than requested.
	#[error("requested {requested} units but only {available} are fillable")]
	InsufficientQuantity { requested: u64, available: u64 },

	/// The only matching orders were made by the taker.
	#[error("taker cannot fill their own orders")]
	SelfFill,

	/// An order can never be filled again (gone, cancelled, invalid payload).
	#[error("order {order_id} is not fillable: {reason}")]
	UnrecoverableOrder { order_id: OrderId, reason: String },

	/// A transient failure while planning an order's fill; retrying may work.
	#[error("temporary failure on order {order_id}: {reason}")]
	TransientOrder { order_id: OrderId, reason: String },

	/// No conversion route between two currencies.
	#[error("no conversion route from {from} to {to}")]
	SwapUnavailable { from: Address, to: Address },

	/// The whole request ran out of its time budget.
	#[error("request timed out")]
	Timeout,
}

impl FillError {
	/// True when no retry can ever make this fill succeed.
	pub fn is_unrecoverable(&self) -> bool {
		matches!(
			self,
			FillError::Validation(_)
				| FillError::SelfFill
				| FillError::UnrecoverableOrder { .. }
		)
	}

	/// True when the error concerns a single order rather than the whole
	/// request, so partial mode can skip the order and continue.
	pub fn is_order_scoped(&self) -> bool {
		matches!(
			self,
			FillError::UnrecoverableOrder { .. } | FillError::TransientOrder { .. }
		)
	}

	/// Stable machine-readable code for API payloads and logs.
	pub fn code(&self) -> &'static str {
		match self {
			FillError::Validation(_) => "validation",
			FillError::NoFillableOrders => "no-fillable-orders",
			FillError::InsufficientQuantity { .. } => "insufficient-quantity",
			FillError::SelfFill => "self-fill",
			FillError::UnrecoverableOrder { .. } => "unrecoverable-order",
			FillError::TransientOrder { .. } => "transient-order",
			FillError::SwapUnavailable { .. } => "swap-unavailable",
			FillError::Timeout => "timeout",
		}
	}
}

/// Observer invoked whenever an order drops out of a plan.
///
/// Implementations get called inline during planning, so they must be cheap
/// and must not block.
pub trait OnErrorHook: Send + Sync {
	/// Reports one order-scoped failure.
	///
	/// `stage` names the planning phase that failed, e.g. "path" or
	/// "router".
	fn on_order_error(&self, stage: &'static str, order_id: Option<&str>, error: &FillError);
}
