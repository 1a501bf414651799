//! Escrow Keeper (component 2): per-(table, player) chip stack.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
	balance::BalanceKeeper,
	error::{EconomyError, EconomyResult},
	ids::{PlayerId, TableId},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEscrow {
	pub table_id: TableId,
	pub player_id: PlayerId,
	pub stack: u64,
	pub committed: u64,
	pub total_buy_in: u64,
	pub total_cash_out: u64,
	pub created_at: i64,
	pub updated_at: i64,
}

impl TableEscrow {
	fn new(table_id: TableId, player_id: PlayerId, now_ms: i64) -> Self {
		Self {
			table_id,
			player_id,
			stack: 0,
			committed: 0,
			total_buy_in: 0,
			total_cash_out: 0,
			created_at: now_ms,
			updated_at: now_ms,
		}
	}

	fn free(&self) -> u64 {
		self.stack - self.committed
	}
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct Key(TableId, PlayerId);

/// Single-writer owner of every `(table, player)` escrow. Cooperates with
/// the Balance Keeper so that `escrow.stack + escrow.committed` for a player
/// across all their tables always equals that player's `locked` balance
/// (spec §3 invariant 2).
#[derive(Debug, Default)]
pub struct EscrowKeeper {
	escrows: HashMap<Key, TableEscrow>,
}

impl EscrowKeeper {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, table: &TableId, player: &PlayerId) -> Option<&TableEscrow> {
		self.escrows.get(&Key(table.clone(), player.clone()))
	}

	pub fn iter(&self) -> impl Iterator<Item = &TableEscrow> {
		self.escrows.values()
	}

	fn entry(&mut self, table: &TableId, player: &PlayerId, now_ms: i64) -> &mut TableEscrow {
		self.escrows
			.entry(Key(table.clone(), player.clone()))
			.or_insert_with(|| TableEscrow::new(table.clone(), player.clone(), now_ms))
	}

	pub fn buy_in(
		&mut self,
		balances: &mut BalanceKeeper,
		table: &TableId,
		player: &PlayerId,
		amount: u64,
		now_ms: i64,
	) -> EconomyResult<()> {
		balances.lock(player, amount, now_ms)?;
		let escrow = self.entry(table, player, now_ms);
		escrow.stack += amount;
		escrow.total_buy_in += amount;
		escrow.updated_at = now_ms;
		Ok(())
	}

	/// `amount = None` defaults to the whole free stack.
	pub fn cash_out(
		&mut self,
		balances: &mut BalanceKeeper,
		table: &TableId,
		player: &PlayerId,
		amount: Option<u64>,
		now_ms: i64,
	) -> EconomyResult<u64> {
		let key = Key(table.clone(), player.clone());
		let escrow = self
			.escrows
			.get_mut(&key)
			.ok_or_else(|| EconomyError::EscrowNotFound {
				table: table.clone(),
				player: player.clone(),
			})?;

		if escrow.committed > 0 {
			return Err(EconomyError::EscrowInsufficient {
				table: table.clone(),
				player: player.clone(),
				requested: amount.unwrap_or(escrow.stack),
				free: 0,
			});
		}

		let amount = amount.unwrap_or(escrow.stack);
		if amount > escrow.free() {
			return Err(EconomyError::EscrowInsufficient {
				table: table.clone(),
				player: player.clone(),
				requested: amount,
				free: escrow.free(),
			});
		}

		escrow.stack -= amount;
		escrow.total_cash_out += amount;
		escrow.updated_at = now_ms;
		let remove = escrow.stack == 0;

		balances.unlock(player, amount, now_ms)?;
		if remove {
			self.escrows.remove(&key);
		}
		Ok(amount)
	}

	pub fn commit_chips(
		&mut self,
		table: &TableId,
		player: &PlayerId,
		amount: u64,
		now_ms: i64,
	) -> EconomyResult<()> {
		let key = Key(table.clone(), player.clone());
		let escrow = self
			.escrows
			.get_mut(&key)
			.ok_or_else(|| EconomyError::EscrowNotFound {
				table: table.clone(),
				player: player.clone(),
			})?;

		if amount > escrow.free() {
			return Err(EconomyError::EscrowInsufficient {
				table: table.clone(),
				player: player.clone(),
				requested: amount,
				free: escrow.free(),
			});
		}
		escrow.committed += amount;
		escrow.updated_at = now_ms;
		Ok(())
	}

	pub fn release_committed(
		&mut self,
		table: &TableId,
		player: &PlayerId,
		amount: Option<u64>,
		now_ms: i64,
	) -> EconomyResult<u64> {
		let key = Key(table.clone(), player.clone());
		let escrow = self
			.escrows
			.get_mut(&key)
			.ok_or_else(|| EconomyError::EscrowNotFound {
				table: table.clone(),
				player: player.clone(),
			})?;

		let amount = amount.unwrap_or(escrow.committed);
		if amount > escrow.committed {
			return Err(EconomyError::InvalidAmount {
				reason: format!("cannot release {amount}, only {} committed", escrow.committed),
			});
		}
		escrow.committed -= amount;
		escrow.updated_at = now_ms;
		Ok(amount)
	}

	/// Chips leave the player-owned accounting frame and enter the pot.
	pub fn move_to_pot(
		&mut self,
		balances: &mut BalanceKeeper,
		table: &TableId,
		player: &PlayerId,
		amount: u64,
		now_ms: i64,
	) -> EconomyResult<()> {
		let key = Key(table.clone(), player.clone());
		let escrow = self
			.escrows
			.get_mut(&key)
			.ok_or_else(|| EconomyError::EscrowNotFound {
				table: table.clone(),
				player: player.clone(),
			})?;

		if amount > escrow.stack || amount > escrow.committed {
			return Err(EconomyError::EscrowInsufficient {
				table: table.clone(),
				player: player.clone(),
				requested: amount,
				free: escrow.committed.min(escrow.stack),
			});
		}
		escrow.stack -= amount;
		escrow.committed -= amount;
		escrow.updated_at = now_ms;

		balances.adjust_locked(player, -(amount as i64), now_ms)?;
		Ok(())
	}

	pub fn award_pot(
		&mut self,
		balances: &mut BalanceKeeper,
		table: &TableId,
		player: &PlayerId,
		amount: u64,
		now_ms: i64,
	) -> EconomyResult<()> {
		let escrow = self.entry(table, player, now_ms);
		escrow.stack += amount;
		escrow.updated_at = now_ms;
		balances.adjust_locked(player, amount as i64, now_ms)?;
		Ok(())
	}

	/// Privileged recovery-only entry point (§4.9): writes an escrow
	/// directly without touching the Balance Keeper, because the balance's
	/// `locked` bucket is reconstructed separately during recovery.
	pub fn restore_escrow(&mut self, escrow: TableEscrow) {
		let key = Key(escrow.table_id.clone(), escrow.player_id.clone());
		self.escrows.insert(key, escrow);
	}

	/// Invariant 2 of spec §8: for every player, `locked` equals the sum of
	/// `(stack + committed)` over all that player's escrows.
	pub fn locked_matches_escrow(&self, balances: &BalanceKeeper) -> Vec<(PlayerId, u64, u64)> {
		let mut totals: HashMap<PlayerId, u64> = HashMap::new();
		for escrow in self.escrows.values() {
			*totals.entry(escrow.player_id.clone()).or_default() += escrow.stack + escrow.committed;
		}
		let mut mismatches = Vec::new();
		for (player, escrow_total) in &totals {
			let locked = balances.get(player).map(|b| b.locked).unwrap_or(0);
			if locked != *escrow_total {
				mismatches.push((player.clone(), locked, *escrow_total));
			}
		}
		mismatches
	}

	pub fn clear(&mut self) {
		self.escrows.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn setup() -> (BalanceKeeper, EscrowKeeper, TableId, PlayerId) {
		let mut bk = BalanceKeeper::new();
		let player = PlayerId::new("p1");
		bk.initialize(player.clone(), 1000, 0).unwrap();
		(bk, EscrowKeeper::new(), TableId::new("t1"), player)
	}

	#[test]
	fn buy_in_then_cash_out_roundtrip() {
		let (mut bk, mut ek, table, player) = setup();
		ek.buy_in(&mut bk, &table, &player, 500, 1).unwrap();
		assert_eq!(bk.get(&player).unwrap().available, 500);
		let cashed = ek.cash_out(&mut bk, &table, &player, None, 2).unwrap();
		assert_eq!(cashed, 500);
		assert_eq!(bk.get(&player).unwrap().available, 1000);
		assert!(ek.get(&table, &player).is_none());
	}

	#[test]
	fn cash_out_rejects_when_committed_nonzero() {
		let (mut bk, mut ek, table, player) = setup();
		ek.buy_in(&mut bk, &table, &player, 500, 1).unwrap();
		ek.commit_chips(&table, &player, 100, 2).unwrap();
		// A player mid-hand cannot cash out any amount, even the free
		// portion (stack - committed = 400), as a matter of policy (spec §9
		// Open Question 2): committed chips block cash-out entirely.
		let err = ek.cash_out(&mut bk, &table, &player, Some(400), 3).unwrap_err();
		assert!(matches!(err, EconomyError::EscrowInsufficient { .. }));
		ek.release_committed(&table, &player, None, 3).unwrap();
		let ok = ek.cash_out(&mut bk, &table, &player, Some(500), 4).unwrap();
		assert_eq!(ok, 500);
	}

	#[test]
	fn move_to_pot_decrements_stack_committed_and_locked() {
		let (mut bk, mut ek, table, player) = setup();
		ek.buy_in(&mut bk, &table, &player, 500, 1).unwrap();
		ek.commit_chips(&table, &player, 100, 2).unwrap();
		ek.move_to_pot(&mut bk, &table, &player, 100, 3).unwrap();
		let escrow = ek.get(&table, &player).unwrap();
		assert_eq!(escrow.stack, 400);
		assert_eq!(escrow.committed, 0);
		assert_eq!(bk.get(&player).unwrap().locked, 400);
	}
}
