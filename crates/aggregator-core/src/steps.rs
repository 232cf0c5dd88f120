//! Client step sequencing.
//!
//! The aggregator never signs or submits anything; it hands the client an
//! ordered to-do list instead. The list follows a fixed template
//! (authentication, currency approval, currency permit, pre-signatures,
//! auth transactions, sales) so clients can rely on the relative order of
//! whatever steps survive: population fills items into the template and
//! empty steps are filtered out afterwards without reordering.

use std::collections::BTreeSet;

use alloy_primitives::{Address, U256};
use serde_json::json;

use aggregator_chain::ChainReader;
use aggregator_types::{
	CheckDescriptor, ExecuteStep, FillOptions, FillOutput, ItemStatus, ListingDetail, StepId,
	StepItem, StepKind,
};

fn describe(id: StepId) -> (&'static str, &'static str, StepKind) {
	match id {
		StepId::Auth => (
			"Sign in to the marketplace",
			"Some of the selected listings can only be filled with an authenticated marketplace session",
			StepKind::Signature,
		),
		StepId::CurrencyApproval => (
			"Approve the payment currency",
			"The approval proxy needs an allowance to move the payment currency",
			StepKind::Transaction,
		),
		StepId::CurrencyPermit => (
			"Sign the currency permit",
			"A signed permit replaces the approval transaction",
			StepKind::Signature,
		),
		StepId::PreSignature => (
			"Sign the marketplace order",
			"The marketplace requires a signed message before releasing the fill",
			StepKind::Signature,
		),
		StepId::AuthTransaction => (
			"Register with the exchange",
			"A one-time on-chain registration required before filling",
			StepKind::Transaction,
		),
		StepId::Sale => (
			"Confirm the purchase",
			"Send the fill transactions",
			StepKind::Transaction,
		),
	}
}

fn empty_step(id: StepId) -> ExecuteStep {
	let (action, description, kind) = describe(id);
	ExecuteStep {
		id,
		action: action.to_string(),
		description: description.to_string(),
		kind,
		items: Vec::new(),
	}
}

fn template() -> Vec<ExecuteStep> {
	StepId::ORDERED.iter().map(|&id| empty_step(id)).collect()
}

fn status_check(body: serde_json::Value) -> CheckDescriptor {
	CheckDescriptor {
		endpoint: "/execute/status".to_string(),
		method: "POST".to_string(),
		body: Some(body),
	}
}

fn push_item(steps: &mut [ExecuteStep], id: StepId, item: StepItem) {
	if let Some(step) = steps.iter_mut().find(|step| step.id == id) {
		step.items.push(item);
	}
}

/// Builds the authentication step when any listing needs a marketplace
/// session the request does not carry. Returns `None` when nothing blocks.
pub(crate) fn auth_step(
	listings: &[ListingDetail],
	taker: Address,
	options: &FillOptions,
) -> Option<ExecuteStep> {
	let mut missing: BTreeSet<String> = BTreeSet::new();
	for listing in listings {
		if !listing.kind.requires_offchain_auth() {
			continue;
		}
		let source = listing
			.source
			.clone()
			.unwrap_or_else(|| "blur.io".to_string());
		if !options.auth_tokens.contains_key(&source) {
			missing.insert(source);
		}
	}
	if missing.is_empty() {
		return None;
	}
	let mut step = empty_step(StepId::Auth);
	step.items = missing
		.into_iter()
		.map(|source| StepItem {
			status: ItemStatus::Incomplete,
			order_ids: Vec::new(),
			data: Some(json!({ "source": &source, "taker": taker })),
			check: Some(status_check(json!({
				"kind": "auth",
				"source": source,
				"taker": taker,
			}))),
		})
		.collect();
	Some(step)
}

/// Populates the step template from a compiled plan.
///
/// Approval items are checked against the current on-chain allowance so a
/// client re-polling after approving sees the item flip to complete.
pub(crate) async fn sequence(chain: &dyn ChainReader, fill: &FillOutput) -> Vec<ExecuteStep> {
	let mut steps = template();

	for tx in &fill.txs {
		for approval in &tx.approvals {
			let granted = chain
				.erc20_allowance(approval.currency, approval.owner, approval.operator)
				.await
				.unwrap_or(U256::ZERO);
			let complete = granted >= approval.amount;
			push_item(
				&mut steps,
				StepId::CurrencyApproval,
				StepItem {
					status: if complete {
						ItemStatus::Complete
					} else {
						ItemStatus::Incomplete
					},
					order_ids: tx.order_ids.clone(),
					data: (!complete).then(|| json!(&approval.tx_data)),
					check: (!complete).then(|| status_check(json!({ "kind": "transaction" }))),
				},
			);
		}
		for permit in &tx.permits {
			push_item(
				&mut steps,
				StepId::CurrencyPermit,
				StepItem {
					status: ItemStatus::Incomplete,
					order_ids: tx.order_ids.clone(),
					data: Some(json!(permit)),
					check: Some(status_check(json!({ "kind": "signature" }))),
				},
			);
		}
	}
	for pre_signature in &fill.pre_signatures {
		push_item(
			&mut steps,
			StepId::PreSignature,
			StepItem {
				status: ItemStatus::Incomplete,
				order_ids: pre_signature.order_ids.clone(),
				data: Some(pre_signature.message.clone()),
				check: Some(status_check(json!({ "kind": "signature" }))),
			},
		);
	}
	for auth_tx in &fill.auth_transactions {
		push_item(
			&mut steps,
			StepId::AuthTransaction,
			StepItem {
				status: ItemStatus::Incomplete,
				order_ids: Vec::new(),
				data: Some(json!(auth_tx)),
				check: Some(status_check(json!({ "kind": "transaction" }))),
			},
		);
	}
	for tx in &fill.txs {
		push_item(
			&mut steps,
			StepId::Sale,
			StepItem {
				status: ItemStatus::Incomplete,
				order_ids: tx.order_ids.clone(),
				data: Some(json!(&tx.tx_data)),
				check: Some(status_check(json!({ "kind": "transaction" }))),
			},
		);
	}

	steps.retain(|step| !step.items.is_empty());
	steps
}

#[cfg(test)]
mod tests {
	use super::*;
	use aggregator_chain::implementations::static_chain::StaticChainReader;
	use aggregator_types::{
		Approval, ContractKind, FillTx, OrderKind, Permit, PreSignature, TxData, NATIVE_CURRENCY,
	};
	use alloy_primitives::Bytes;

	fn tx_data() -> TxData {
		TxData {
			from: Address::repeat_byte(0x77),
			to: Address::repeat_byte(0xa1),
			data: Bytes::from(vec![0x01]),
			value: U256::from(100),
		}
	}

	fn sale_tx(approvals: Vec<Approval>, permits: Vec<Permit>) -> FillTx {
		FillTx {
			tx_data: tx_data(),
			order_ids: vec!["order-1".to_string()],
			approvals,
			permits,
		}
	}

	fn approval(amount: u64) -> Approval {
		Approval {
			currency: Address::repeat_byte(0x55),
			owner: Address::repeat_byte(0x77),
			operator: Address::repeat_byte(0xa2),
			amount: U256::from(amount),
			tx_data: tx_data(),
		}
	}

	fn permit() -> Permit {
		Permit {
			currency: Address::repeat_byte(0x55),
			owner: Address::repeat_byte(0x77),
			spender: Address::repeat_byte(0xa2),
			amount: U256::from(100),
			deadline: 1_999,
			typed_data: json!({"primaryType": "Permit"}),
		}
	}

	fn blur_listing(source: Option<&str>) -> ListingDetail {
		ListingDetail {
			order_id: "blur-1".to_string(),
			kind: OrderKind::Blur,
			contract: Address::repeat_byte(0x11),
			contract_kind: ContractKind::Erc721,
			token_id: Some(U256::from(1)),
			quantity: 1,
			flagged: false,
			maker: Address::repeat_byte(0x22),
			source: source.map(str::to_string),
			currency: NATIVE_CURRENCY,
			price: U256::from(100),
			fees: Vec::new(),
			raw_data: serde_json::Value::Null,
		}
	}

	#[tokio::test]
	async fn test_full_plan_follows_template_order() {
		let chain = StaticChainReader::new();
		let fill = FillOutput {
			txs: vec![sale_tx(vec![approval(100)], vec![permit()])],
			pre_signatures: vec![PreSignature {
				order_ids: vec!["order-1".to_string()],
				message: json!({"sign": "me"}),
			}],
			auth_transactions: vec![tx_data()],
			..Default::default()
		};
		let steps = sequence(&chain, &fill).await;
		let ids: Vec<StepId> = steps.iter().map(|step| step.id).collect();
		assert_eq!(
			ids,
			vec![
				StepId::CurrencyApproval,
				StepId::CurrencyPermit,
				StepId::PreSignature,
				StepId::AuthTransaction,
				StepId::Sale,
			]
		);
	}

	#[tokio::test]
	async fn test_filtering_preserves_relative_order() {
		// Native buy-in: no approval, no permit. The survivors keep their
		// relative positions.
		let chain = StaticChainReader::new();
		let fill = FillOutput {
			txs: vec![sale_tx(Vec::new(), Vec::new())],
			pre_signatures: vec![PreSignature {
				order_ids: vec!["order-1".to_string()],
				message: json!({"sign": "me"}),
			}],
			..Default::default()
		};
		let steps = sequence(&chain, &fill).await;
		let ids: Vec<StepId> = steps.iter().map(|step| step.id).collect();
		assert_eq!(ids, vec![StepId::PreSignature, StepId::Sale]);
	}

	#[tokio::test]
	async fn test_granted_allowance_marks_approval_complete() {
		let chain = StaticChainReader::new();
		chain.seed_allowance(
			Address::repeat_byte(0x55),
			Address::repeat_byte(0x77),
			Address::repeat_byte(0xa2),
			U256::from(1_000),
		);
		let fill = FillOutput {
			txs: vec![sale_tx(vec![approval(100)], Vec::new())],
			..Default::default()
		};
		let steps = sequence(&chain, &fill).await;
		let approval_step = steps
			.iter()
			.find(|step| step.id == StepId::CurrencyApproval)
			.unwrap();
		assert_eq!(approval_step.items[0].status, ItemStatus::Complete);
		assert!(approval_step.items[0].data.is_none());
		assert!(approval_step.items[0].check.is_none());
	}

	#[tokio::test]
	async fn test_missing_allowance_leaves_approval_incomplete() {
		let chain = StaticChainReader::new();
		let fill = FillOutput {
			txs: vec![sale_tx(vec![approval(100)], Vec::new())],
			..Default::default()
		};
		let steps = sequence(&chain, &fill).await;
		let approval_step = steps
			.iter()
			.find(|step| step.id == StepId::CurrencyApproval)
			.unwrap();
		assert_eq!(approval_step.items[0].status, ItemStatus::Incomplete);
		assert!(approval_step.items[0].data.is_some());
		assert!(approval_step.items[0].check.is_some());
	}

	#[test]
	fn test_auth_step_lists_each_missing_source_once() {
		let listings = vec![
			blur_listing(None),
			blur_listing(Some("blur.io")),
			blur_listing(Some("other.market")),
		];
		let step = auth_step(&listings, Address::repeat_byte(0x77), &FillOptions::default())
			.expect("auth should block");
		assert_eq!(step.id, StepId::Auth);
		assert_eq!(step.kind, StepKind::Signature);
		assert_eq!(step.items.len(), 2);
		assert!(step
			.items
			.iter()
			.all(|item| item.status == ItemStatus::Incomplete && item.check.is_some()));
	}

	#[test]
	fn test_auth_step_absent_when_tokens_present() {
		let listings = vec![blur_listing(None)];
		let options = FillOptions {
			auth_tokens: std::collections::HashMap::from([(
				"blur.io".to_string(),
				"tok".to_string(),
			)]),
			..Default::default()
		};
		assert!(auth_step(&listings, Address::repeat_byte(0x77), &options).is_none());
	}
}
