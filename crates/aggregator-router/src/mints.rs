//! Mint transaction compilation.
//!
//! Mint functions differ per collection, so the store carries a calldata
//! template (selector plus typed parameter roles) and the arguments are
//! ABI-encoded here at fill time. One transaction per mint, no router
//! involvement.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, U256};

use aggregator_types::{
	is_native, FillTx, MintDetail, MintParam, MintParamKind, OrderId, OrderKind, TxData,
};

use crate::RouterError;

/// Synthetic order id mints report under.
pub(crate) fn mint_order_id(mint: &MintDetail) -> OrderId {
	format!("mint:{}", mint.collection)
}

fn payload_err(mint: &MintDetail, message: impl Into<String>) -> RouterError {
	RouterError::Payload {
		order_id: mint_order_id(mint),
		message: message.into(),
	}
}

fn selector(mint: &MintDetail) -> Result<[u8; 4], RouterError> {
	let raw = mint.tx_template.calldata.signature.trim_start_matches("0x");
	let bytes =
		hex::decode(raw).map_err(|e| payload_err(mint, format!("bad mint selector: {e}")))?;
	<[u8; 4]>::try_from(bytes.as_slice())
		.map_err(|_| payload_err(mint, "mint selector must be 4 bytes"))
}

fn param_value(
	mint: &MintDetail,
	param: &MintParam,
	taker: Address,
) -> Result<DynSolValue, RouterError> {
	let ty = DynSolType::parse(&param.abi_type)
		.map_err(|e| payload_err(mint, format!("bad abi type {}: {e}", param.abi_type)))?;
	match param.kind {
		MintParamKind::Recipient => match ty {
			DynSolType::Address => Ok(DynSolValue::Address(taker)),
			_ => Err(payload_err(mint, "recipient param must be an address")),
		},
		MintParamKind::Quantity => match ty {
			DynSolType::Uint(bits) => Ok(DynSolValue::Uint(U256::from(mint.quantity), bits)),
			_ => Err(payload_err(mint, "quantity param must be a uint")),
		},
		MintParamKind::TokenId => {
			let token_id = mint
				.token_id
				.ok_or_else(|| payload_err(mint, "mint stage has no token id"))?;
			match ty {
				DynSolType::Uint(bits) => Ok(DynSolValue::Uint(token_id, bits)),
				_ => Err(payload_err(mint, "token id param must be a uint")),
			}
		}
		MintParamKind::Custom => {
			let value = param
				.value
				.as_ref()
				.ok_or_else(|| payload_err(mint, "custom param without a value"))?;
			let text = match value {
				serde_json::Value::String(s) => s.clone(),
				other => other.to_string(),
			};
			ty.coerce_str(&text)
				.map_err(|e| payload_err(mint, format!("bad custom param: {e}")))
		}
	}
}

/// Compiles one mint into its taker transaction. Only native-currency mints
/// are fillable; `price` is the total for the minted quantity.
pub(crate) fn build_mint_tx(mint: &MintDetail, taker: Address) -> Result<FillTx, RouterError> {
	if !is_native(mint.currency) {
		return Err(RouterError::Currency {
			kind: OrderKind::Mint,
			currency: mint.currency,
		});
	}
	let selector = selector(mint)?;
	let mut values = Vec::with_capacity(mint.tx_template.calldata.params.len());
	for param in &mint.tx_template.calldata.params {
		values.push(param_value(mint, param, taker)?);
	}
	let mut data = selector.to_vec();
	data.extend(DynSolValue::Tuple(values).abi_encode_params());
	Ok(FillTx {
		tx_data: TxData {
			from: taker,
			to: mint.tx_template.to,
			data: data.into(),
			value: mint.price,
		},
		order_ids: vec![mint_order_id(mint)],
		approvals: vec![],
		permits: vec![],
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use aggregator_types::{MintCalldataTemplate, MintTxTemplate, NATIVE_CURRENCY};
	use serde_json::json;

	fn mint(params: Vec<MintParam>) -> MintDetail {
		MintDetail {
			collection: "0x1111:azuki".to_string(),
			contract: Address::repeat_byte(0x11),
			stage: "public-sale".to_string(),
			token_id: None,
			quantity: 2,
			price: U256::from(2_000),
			currency: NATIVE_CURRENCY,
			tx_template: MintTxTemplate {
				to: Address::repeat_byte(0x11),
				calldata: MintCalldataTemplate {
					signature: "0xa0712d68".to_string(),
					params,
				},
			},
		}
	}

	fn param(kind: MintParamKind, abi_type: &str, value: Option<serde_json::Value>) -> MintParam {
		MintParam {
			kind,
			abi_type: abi_type.to_string(),
			value,
		}
	}

	#[test]
	fn test_mint_tx_substitutes_recipient_and_quantity() {
		let taker = Address::repeat_byte(0x33);
		let mint = mint(vec![
			param(MintParamKind::Recipient, "address", None),
			param(MintParamKind::Quantity, "uint256", None),
			param(MintParamKind::Custom, "uint256", Some(json!(7))),
		]);
		let tx = build_mint_tx(&mint, taker).unwrap();
		assert_eq!(tx.tx_data.from, taker);
		assert_eq!(tx.tx_data.to, mint.tx_template.to);
		assert_eq!(tx.tx_data.value, U256::from(2_000));
		assert_eq!(tx.order_ids, vec!["mint:0x1111:azuki".to_string()]);
		assert_eq!(&tx.tx_data.data[..4], &[0xa0, 0x71, 0x2d, 0x68]);

		let ty = DynSolType::parse("(address,uint256,uint256)").unwrap();
		let decoded = ty.abi_decode_params(&tx.tx_data.data[4..]).unwrap();
		let values = decoded.as_tuple().unwrap();
		assert_eq!(values[0], DynSolValue::Address(taker));
		assert_eq!(values[1], DynSolValue::Uint(U256::from(2), 256));
		assert_eq!(values[2], DynSolValue::Uint(U256::from(7), 256));
	}

	#[test]
	fn test_custom_address_param_coerces_from_string() {
		let mint = mint(vec![param(
			MintParamKind::Custom,
			"address",
			Some(json!("0x2222222222222222222222222222222222222222")),
		)]);
		let tx = build_mint_tx(&mint, Address::repeat_byte(0x33)).unwrap();
		let ty = DynSolType::parse("(address)").unwrap();
		let decoded = ty.abi_decode_params(&tx.tx_data.data[4..]).unwrap();
		let values = decoded.as_tuple().unwrap();
		assert_eq!(values[0], DynSolValue::Address(Address::repeat_byte(0x22)));
	}

	#[test]
	fn test_token_id_param_requires_fixed_token() {
		let mint = mint(vec![param(MintParamKind::TokenId, "uint256", None)]);
		let err = build_mint_tx(&mint, Address::repeat_byte(0x33)).unwrap_err();
		assert!(matches!(err, RouterError::Payload { .. }));
	}

	#[test]
	fn test_bad_selector_is_a_payload_error() {
		let mut m = mint(vec![]);
		m.tx_template.calldata.signature = "0x123".to_string();
		let err = build_mint_tx(&m, Address::repeat_byte(0x33)).unwrap_err();
		assert!(matches!(err, RouterError::Payload { .. }));
	}

	#[test]
	fn test_erc20_mint_is_rejected() {
		let mut m = mint(vec![]);
		m.currency = Address::repeat_byte(0x55);
		let err = build_mint_tx(&m, Address::repeat_byte(0x33)).unwrap_err();
		assert!(matches!(err, RouterError::Currency { .. }));
	}
}
