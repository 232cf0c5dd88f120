//! Request-scoped mutable ledgers.
//!
//! Path building is path-dependent: how much of an order is still takeable,
//! how many units a maker can actually deliver and what the next unit out of
//! an AMM pool costs all depend on what the pass has already consumed. That
//! state lives in a [`FillContext`] created per request and threaded through
//! the builder by mutable reference, never in process-wide globals.

use std::collections::HashMap;

use alloy_primitives::{keccak256, Address, U256};

use aggregator_types::{OrderId, OrderKind};

/// One maker's holdings of one token, as tracked within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MakerAsset {
	/// Order creator whose balance is tracked.
	pub maker: Address,
	/// NFT contract.
	pub contract: Address,
	/// Token id within the contract.
	pub token_id: U256,
}

/// Mutable state of one path-building pass.
#[derive(Debug, Default)]
pub struct FillContext {
	filled: HashMap<OrderId, u64>,
	maker_balances: HashMap<MakerAsset, U256>,
	pool_ledgers: HashMap<String, Vec<U256>>,
}

impl FillContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Units of an order this pass has already placed in the path.
	pub fn filled(&self, id: &str) -> u64 {
		self.filled.get(id).copied().unwrap_or(0)
	}

	/// Records `quantity` more units of an order as taken.
	pub fn note_fill(&mut self, id: &str, quantity: u64) {
		*self.filled.entry(id.to_string()).or_insert(0) += quantity;
	}

	/// Remaining balance of a maker asset, if it has been observed.
	pub fn maker_balance(&self, asset: &MakerAsset) -> Option<U256> {
		self.maker_balances.get(asset).copied()
	}

	/// Seeds a freshly fetched maker balance. A balance already observed
	/// this pass wins, since it reflects earlier consumption.
	pub fn observe_maker_balance(&mut self, asset: MakerAsset, balance: U256) {
		self.maker_balances.entry(asset).or_insert(balance);
	}

	/// Consumes `quantity` units of an observed maker balance.
	pub fn consume_maker_balance(&mut self, asset: &MakerAsset, quantity: u64) {
		if let Some(balance) = self.maker_balances.get_mut(asset) {
			*balance = balance.saturating_sub(U256::from(quantity));
		}
	}

	/// Prices consumed from a pool so far this pass.
	pub fn pool_ledger(&self, pool: &str) -> &[U256] {
		self.pool_ledgers
			.get(pool)
			.map(Vec::as_slice)
			.unwrap_or(&[])
	}

	/// Prices the next unit out of a pool and appends it to the pool's
	/// consumed ledger.
	///
	/// The i-th unit taken from a pool within one pass costs
	/// `ladder[min(i, ladder.len() - 1)]`; a pool keeps selling at its last
	/// quoted price once the ladder is exhausted. Returns `None` for an
	/// empty ladder.
	pub fn next_pool_price(&mut self, pool: &str, ladder: &[U256]) -> Option<U256> {
		let last = ladder.len().checked_sub(1)?;
		let consumed = self.pool_ledgers.entry(pool.to_string()).or_default();
		let price = ladder[consumed.len().min(last)];
		consumed.push(price);
		Some(price)
	}
}

/// Ledger key of a pool. All tokens sold by one pool share one price ladder,
/// so the token id is deliberately not part of the key.
pub fn pool_key(kind: OrderKind, pool: Address) -> String {
	let mut preimage = Vec::with_capacity(kind.as_str().len() + 24);
	preimage.extend_from_slice(kind.as_str().as_bytes());
	preimage.extend_from_slice(pool.as_slice());
	preimage.extend_from_slice(b"sell");
	hex::encode(keccak256(&preimage))
}

/// Deterministic order id for an inline order that has none of its own, so
/// pool and Blur payloads fold into the regular order flow.
pub fn derived_order_id(kind: OrderKind, seed: Address, token_id: Option<U256>) -> OrderId {
	let mut preimage = Vec::with_capacity(kind.as_str().len() + 56);
	preimage.extend_from_slice(kind.as_str().as_bytes());
	preimage.extend_from_slice(seed.as_slice());
	preimage.extend_from_slice(b"sell");
	if let Some(token_id) = token_id {
		preimage.extend_from_slice(&token_id.to_be_bytes::<32>());
	}
	format!("0x{}", hex::encode(keccak256(&preimage)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pool_ladder_clamps_to_last_price() {
		let mut ctx = FillContext::new();
		let ladder = vec![U256::from(100), U256::from(150)];

		assert_eq!(ctx.next_pool_price("pool-a", &ladder), Some(U256::from(100)));
		assert_eq!(ctx.next_pool_price("pool-a", &ladder), Some(U256::from(150)));
		assert_eq!(ctx.next_pool_price("pool-a", &ladder), Some(U256::from(150)));
		assert_eq!(ctx.pool_ledger("pool-a").len(), 3);

		// A different pool starts from the top of its own ladder.
		assert_eq!(ctx.next_pool_price("pool-b", &ladder), Some(U256::from(100)));
	}

	#[test]
	fn test_empty_ladder_yields_no_price() {
		let mut ctx = FillContext::new();
		assert_eq!(ctx.next_pool_price("pool-a", &[]), None);
		assert!(ctx.pool_ledger("pool-a").is_empty());
	}

	#[test]
	fn test_maker_balance_is_consumed_not_refetched() {
		let mut ctx = FillContext::new();
		let asset = MakerAsset {
			maker: Address::repeat_byte(1),
			contract: Address::repeat_byte(2),
			token_id: U256::from(7),
		};

		assert_eq!(ctx.maker_balance(&asset), None);
		ctx.observe_maker_balance(asset, U256::from(2));
		ctx.consume_maker_balance(&asset, 2);
		assert_eq!(ctx.maker_balance(&asset), Some(U256::ZERO));

		// A later observation must not resurrect consumed balance.
		ctx.observe_maker_balance(asset, U256::from(5));
		assert_eq!(ctx.maker_balance(&asset), Some(U256::ZERO));
	}

	#[test]
	fn test_fill_ledger_accumulates_per_order() {
		let mut ctx = FillContext::new();
		ctx.note_fill("order-1", 2);
		ctx.note_fill("order-1", 1);
		ctx.note_fill("order-2", 4);
		assert_eq!(ctx.filled("order-1"), 3);
		assert_eq!(ctx.filled("order-2"), 4);
		assert_eq!(ctx.filled("order-3"), 0);
	}

	#[test]
	fn test_pool_key_ignores_token_id() {
		let pool = Address::repeat_byte(9);
		let key = pool_key(OrderKind::Sudoswap, pool);
		assert_eq!(key, pool_key(OrderKind::Sudoswap, pool));
		assert_ne!(key, pool_key(OrderKind::Nftx, pool));

		let id_a = derived_order_id(OrderKind::Sudoswap, pool, Some(U256::from(1)));
		let id_b = derived_order_id(OrderKind::Sudoswap, pool, Some(U256::from(2)));
		assert_ne!(id_a, id_b);
		assert!(id_a.starts_with("0x"));
	}
}
