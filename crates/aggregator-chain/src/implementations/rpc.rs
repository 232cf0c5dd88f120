//! JSON-RPC chain reader.
//!
//! A deliberately small client: planning only ever issues `eth_call` and
//! `eth_getBalance`, so this talks JSON-RPC directly over HTTP instead of
//! pulling in a full provider stack.

use async_trait::async_trait;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use alloy_primitives::{Address, Bytes, U256};

use crate::{ChainError, ChainReader};

/// [`ChainReader`] backed by a JSON-RPC endpoint.
pub struct RpcChainReader {
	client: reqwest::Client,
	url: String,
}

impl RpcChainReader {
	/// Creates a reader against `url` with the given request timeout.
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ChainError::Transport(e.to_string()))?;
		Ok(RpcChainReader {
			client,
			url: url.into(),
		})
	}

	async fn rpc(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<serde_json::Value, ChainError> {
		let body = serde_json::json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": method,
			"params": params,
		});
		debug!(method, "issuing RPC request");

		let response = self
			.client
			.post(&self.url)
			.json(&body)
			.send()
			.await
			.map_err(|e| ChainError::Transport(e.to_string()))?;
		let payload: serde_json::Value = response
			.json()
			.await
			.map_err(|e| ChainError::Transport(e.to_string()))?;

		if let Some(error) = payload.get("error") {
			return Err(ChainError::Rpc(error.to_string()));
		}
		payload
			.get("result")
			.cloned()
			.ok_or_else(|| ChainError::Rpc("response missing result".to_string()))
	}

	fn result_str(result: &serde_json::Value) -> Result<&str, ChainError> {
		result
			.as_str()
			.ok_or_else(|| ChainError::Rpc("result is not a string".to_string()))
	}
}

#[async_trait]
impl ChainReader for RpcChainReader {
	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
		let result = self
			.rpc(
				"eth_call",
				serde_json::json!([
					{ "to": to.to_string(), "data": data.to_string() },
					"latest",
				]),
			)
			.await?;
		let hex = Self::result_str(&result)?;
		Bytes::from_str(hex).map_err(|e| ChainError::Decode(e.to_string()))
	}

	async fn native_balance(&self, owner: Address) -> Result<U256, ChainError> {
		let result = self
			.rpc(
				"eth_getBalance",
				serde_json::json!([owner.to_string(), "latest"]),
			)
			.await?;
		let hex = Self::result_str(&result)?;
		let digits = hex.strip_prefix("0x").unwrap_or(hex);
		U256::from_str_radix(digits, 16).map_err(|e| ChainError::Decode(e.to_string()))
	}
}

/// Factory function to create an RPC chain reader from configuration.
pub fn create_chain(config: &toml::Value) -> Box<dyn ChainReader> {
	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.expect("chain rpc config requires a url");
	let timeout_ms = config
		.get("timeout_ms")
		.and_then(|v| v.as_integer())
		.unwrap_or(10_000) as u64;
	let reader = RpcChainReader::new(url, Duration::from_millis(timeout_ms))
		.expect("failed to build RPC client");
	Box::new(reader)
}
