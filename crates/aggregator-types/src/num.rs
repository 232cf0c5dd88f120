//! Integer price math.
//!
//! All money amounts are `U256` in the currency's smallest unit. There is no
//! floating point anywhere in the fill pipeline; where a division has to
//! round, it rounds in the protocol's favor (ceiling on amounts owed).

use alloy_primitives::U256;

/// Basis point denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// `value * numerator / denominator`, rounded down.
///
/// Returns zero for a zero denominator and saturates on overflow; both are
/// out of range for realistic prices.
pub fn mul_div_floor(value: U256, numerator: U256, denominator: U256) -> U256 {
	if denominator.is_zero() {
		return U256::ZERO;
	}
	match value.checked_mul(numerator) {
		Some(product) => product / denominator,
		None => U256::MAX / denominator,
	}
}

/// `value * numerator / denominator`, rounded up.
pub fn mul_div_ceil(value: U256, numerator: U256, denominator: U256) -> U256 {
	if denominator.is_zero() {
		return U256::ZERO;
	}
	match value.checked_mul(numerator) {
		Some(product) => {
			let floor = product / denominator;
			if (product % denominator).is_zero() {
				floor
			} else {
				floor + U256::from(1)
			}
		}
		None => U256::MAX / denominator,
	}
}

/// Fee amount for `bps` basis points of `price`, rounded down.
pub fn fee_from_bps(price: U256, bps: u16) -> U256 {
	mul_div_floor(price, U256::from(bps), U256::from(BPS_DENOMINATOR))
}

/// Expresses `amount` as basis points of `total`.
///
/// Returns `None` when `total` is zero or the result would exceed 10000,
/// since a fee larger than its base has no meaningful bps representation.
pub fn bps_of(amount: U256, total: U256) -> Option<u64> {
	if total.is_zero() {
		return None;
	}
	let bps = mul_div_floor(amount, U256::from(BPS_DENOMINATOR), total);
	let bps = u64::try_from(bps).ok()?;
	if bps > BPS_DENOMINATOR {
		None
	} else {
		Some(bps)
	}
}

/// Formats a raw amount as a decimal string with `decimals` fractional
/// digits, trailing zeros trimmed.
pub fn format_units(value: U256, decimals: u8) -> String {
	let scale = U256::from(10).pow(U256::from(decimals));
	let integer = value / scale;
	let fraction = value % scale;
	if fraction.is_zero() {
		integer.to_string()
	} else {
		let digits = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
		format!("{integer}.{}", digits.trim_end_matches('0'))
	}
}
