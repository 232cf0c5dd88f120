//! Externally fetched fill calldata.
//!
//! Blur-family and X2Y2 orders cannot be compiled locally: their order books
//! release signed fill calldata only through their own services, and refuse
//! contract-mediated fills outright. The planner groups such listings per
//! (protocol, contract) and asks a [`CalldataFetcher`] for one ready-made
//! transaction per group.

use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use aggregator_types::{u256_string, OrderId, OrderKind, TxData};
use alloy_primitives::{Address, U256};

/// One order inside a calldata request.
#[derive(Debug, Clone)]
pub struct CalldataItem {
	pub order_id: OrderId,
	pub token_id: Option<U256>,
	pub price: U256,
	pub quantity: u64,
	/// Original marketplace payload, passed through untouched.
	pub raw_data: Value,
}

/// A group of same-protocol listings on one contract.
#[derive(Debug, Clone)]
pub struct CalldataBatch {
	pub kind: OrderKind,
	pub contract: Address,
	pub taker: Address,
	/// Marketplace session token, for sources gated behind sign-in.
	pub auth: Option<String>,
	pub items: Vec<CalldataItem>,
}

/// A ready-made fill transaction for one batch.
#[derive(Debug, Clone)]
pub struct FetchedBatch {
	pub tx_data: TxData,
	/// Message the taker must sign and relay before the fill clears.
	pub pre_sign: Option<Value>,
}

/// Failure fetching calldata for a batch.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
	/// The service confirmed the orders are gone; retrying is pointless.
	#[error("{0}")]
	Gone(String),
	/// Rate limit, timeout or upstream error; retrying may work.
	#[error("{0}")]
	Transient(String),
}

impl FetchError {
	pub fn is_unrecoverable(&self) -> bool {
		matches!(self, FetchError::Gone(_))
	}
}

/// Produces fill transactions for externally-custodied order books.
#[async_trait]
pub trait CalldataFetcher: Send + Sync {
	async fn fetch_batch(&self, batch: &CalldataBatch) -> Result<FetchedBatch, FetchError>;
}

#[derive(Debug, Deserialize)]
struct HttpCalldataConfig {
	base_url: String,
	timeout_ms: Option<u64>,
	max_retries: Option<u32>,
}

/// Fetches calldata over HTTP from a fulfillment service.
///
/// `POST {base_url}/listings` with the batch body; the response carries one
/// transaction filling the whole batch, plus an optional pre-sign message.
pub struct HttpCalldataFetcher {
	client: reqwest::Client,
	base_url: String,
	max_retries: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FillResponse {
	tx: WireTx,
	#[serde(default)]
	pre_sign: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireTx {
	to: Address,
	data: alloy_primitives::Bytes,
	#[serde(default, with = "u256_string")]
	value: U256,
}

impl HttpCalldataFetcher {
	pub fn new(base_url: String, timeout_ms: u64, max_retries: u32) -> Self {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_millis(timeout_ms))
			.build()
			.expect("Failed to create HTTP client");
		Self {
			client,
			base_url,
			max_retries,
		}
	}

	async fn post_batch(&self, batch: &CalldataBatch) -> Result<FetchedBatch, FetchError> {
		let url = format!("{}/listings", self.base_url.trim_end_matches('/'));
		let response = self
			.client
			.post(&url)
			.json(&batch_body(batch))
			.send()
			.await
			.map_err(|e| FetchError::Transient(e.to_string()))?;
		let status = response.status().as_u16();
		if !(200..300).contains(&status) {
			let body = response.text().await.unwrap_or_default();
			return Err(classify_status(status, &body));
		}
		let parsed: FillResponse = response
			.json()
			.await
			.map_err(|e| FetchError::Transient(format!("malformed fill response: {e}")))?;
		Ok(FetchedBatch {
			tx_data: TxData {
				from: batch.taker,
				to: parsed.tx.to,
				data: parsed.tx.data,
				value: parsed.tx.value,
			},
			pre_sign: parsed.pre_sign,
		})
	}
}

#[async_trait]
impl CalldataFetcher for HttpCalldataFetcher {
	async fn fetch_batch(&self, batch: &CalldataBatch) -> Result<FetchedBatch, FetchError> {
		let mut backoff = ExponentialBackoff {
			max_elapsed_time: Some(Duration::from_secs(30)),
			..Default::default()
		};
		let mut attempts = 0u32;
		loop {
			match self.post_batch(batch).await {
				Ok(filled) => return Ok(filled),
				Err(FetchError::Gone(reason)) => return Err(FetchError::Gone(reason)),
				Err(FetchError::Transient(reason)) => {
					attempts += 1;
					if attempts > self.max_retries {
						return Err(FetchError::Transient(reason));
					}
					let delay = match backoff.next_backoff() {
						Some(delay) => delay,
						None => return Err(FetchError::Transient(reason)),
					};
					warn!(
						attempt = attempts,
						max = self.max_retries,
						error = %reason,
						"calldata fetch failed, retrying"
					);
					tokio::time::sleep(delay).await;
				}
			}
		}
	}
}

/// Wire body for one batch.
fn batch_body(batch: &CalldataBatch) -> Value {
	let items: Vec<Value> = batch
		.items
		.iter()
		.map(|item| {
			json!({
				"orderId": item.order_id,
				"tokenId": item.token_id.map(|id| id.to_string()),
				"price": item.price.to_string(),
				"quantity": item.quantity,
				"rawData": item.raw_data,
			})
		})
		.collect();
	let mut body = json!({
		"protocolVersion": batch.kind.as_str(),
		"contract": batch.contract,
		"taker": batch.taker,
		"items": items,
	});
	if let Some(auth) = &batch.auth {
		body["authToken"] = json!(auth);
	}
	body
}

/// 400-class "the order is gone" answers are final; everything else is worth
/// retrying.
fn classify_status(status: u16, body: &str) -> FetchError {
	match status {
		400 | 404 | 410 => FetchError::Gone(format!(
			"calldata service rejected the batch ({status}): {body}"
		)),
		_ => FetchError::Transient(format!("calldata service error ({status}): {body}")),
	}
}

/// Factory function to create a calldata fetcher from configuration.
pub fn create_calldata(config: &toml::Value) -> Box<dyn CalldataFetcher> {
	let config: HttpCalldataConfig = config
		.clone()
		.try_into()
		.expect("http calldata config must be valid");
	Box::new(HttpCalldataFetcher::new(
		config.base_url,
		config.timeout_ms.unwrap_or(10_000),
		config.max_retries.unwrap_or(3),
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn batch() -> CalldataBatch {
		CalldataBatch {
			kind: OrderKind::Blur,
			contract: Address::repeat_byte(0x11),
			taker: Address::repeat_byte(0x33),
			auth: Some("session-token".to_string()),
			items: vec![CalldataItem {
				order_id: "blur-1".to_string(),
				token_id: Some(U256::from(7)),
				price: U256::from(1_000),
				quantity: 1,
				raw_data: json!({ "orderHash": "0xabc" }),
			}],
		}
	}

	#[test]
	fn test_batch_body_shape() {
		let body = batch_body(&batch());
		assert_eq!(body["protocolVersion"], "blur");
		assert_eq!(body["authToken"], "session-token");
		assert_eq!(body["items"][0]["orderId"], "blur-1");
		assert_eq!(body["items"][0]["tokenId"], "7");
		assert_eq!(body["items"][0]["price"], "1000");
		assert_eq!(body["items"][0]["rawData"]["orderHash"], "0xabc");
	}

	#[test]
	fn test_auth_token_is_omitted_when_absent() {
		let mut b = batch();
		b.auth = None;
		let body = batch_body(&b);
		assert!(body.get("authToken").is_none());
	}

	#[test]
	fn test_status_classification() {
		assert!(classify_status(404, "unknown order").is_unrecoverable());
		assert!(classify_status(410, "").is_unrecoverable());
		assert!(classify_status(400, "bad order").is_unrecoverable());
		assert!(!classify_status(429, "slow down").is_unrecoverable());
		assert!(!classify_status(503, "").is_unrecoverable());
	}

	#[test]
	fn test_fill_response_parses_wire_tx() {
		let parsed: FillResponse = serde_json::from_value(json!({
			"tx": {
				"to": "0x1111111111111111111111111111111111111111",
				"data": "0xdeadbeef",
				"value": "1000"
			},
			"preSign": { "message": "sign me" }
		}))
		.unwrap();
		assert_eq!(parsed.tx.value, U256::from(1_000));
		assert_eq!(parsed.tx.data.len(), 4);
		assert!(parsed.pre_sign.is_some());
	}
}
