//! Transaction Coordinator (component 7): a builder-style atomic multi-op
//! transaction with compensating rollback and idempotency-key de-dup.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
	balance::BalanceKeeper,
	error::{EconomyError, EconomyResult},
	escrow::EscrowKeeper,
	ids::{HandId, PlayerId, TableId, TransactionId},
	ledger::Ledger,
	pot::Street,
};

/// The actors a transaction needs mutable access to at commit time. Bundled
/// by reference so a `TransactionBuilder` can be assembled well before the
/// actors it will touch are locked for the commit.
pub struct EconomyContext<'a> {
	pub balances: &'a mut BalanceKeeper,
	pub escrows: &'a mut EscrowKeeper,
	pub ledger: &'a mut Ledger,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OpKind {
	LockChips { player: PlayerId, amount: u64 },
	UnlockChips { player: PlayerId, amount: u64 },
	BuyIn { table: TableId, player: PlayerId, amount: u64 },
	CashOut { table: TableId, player: PlayerId, amount: u64 },
	CommitToPot { table: TableId, player: PlayerId, amount: u64 },
	MoveToPot { table: TableId, player: PlayerId, amount: u64 },
	AwardPot { table: TableId, player: PlayerId, amount: u64 },
	CollectRake { table: TableId, hand: HandId, amount: u64 },
	BetAction { table: TableId, player: PlayerId, amount: u64, street: Street },
}

type OpFn = Box<dyn FnOnce(&mut EconomyContext) -> EconomyResult<()>>;
type RollbackFn = Box<dyn FnOnce(&mut EconomyContext) -> EconomyResult<()>>;

struct Step {
	kind: OpKind,
	op: OpFn,
	rollback: RollbackFn,
}

fn no_op_rollback() -> RollbackFn {
	Box::new(|_ctx: &mut EconomyContext| Ok(()))
}

pub struct TransactionBuilder {
	transaction_id: TransactionId,
	hand_id: Option<HandId>,
	table_id: Option<TableId>,
	idempotency_key: Option<String>,
	steps: Vec<Step>,
}

impl TransactionBuilder {
	pub fn new(transaction_id: TransactionId) -> Self {
		Self {
			transaction_id,
			hand_id: None,
			table_id: None,
			idempotency_key: None,
			steps: Vec::new(),
		}
	}

	pub fn for_hand(mut self, hand: HandId) -> Self {
		self.hand_id = Some(hand);
		self
	}

	pub fn for_table(mut self, table: TableId) -> Self {
		self.table_id = Some(table);
		self
	}

	pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
		self.idempotency_key = Some(key.into());
		self
	}

	pub fn lock_chips(mut self, player: PlayerId, amount: u64, now_ms: i64) -> Self {
		let kind = OpKind::LockChips {
			player: player.clone(),
			amount,
		};
		let op_player = player.clone();
		let rollback_player = player;
		self.steps.push(Step {
			kind,
			op: Box::new(move |ctx| ctx.balances.lock(&op_player, amount, now_ms)),
			rollback: Box::new(move |ctx| ctx.balances.unlock(&rollback_player, amount, now_ms)),
		});
		self
	}

	pub fn unlock_chips(mut self, player: PlayerId, amount: u64, now_ms: i64) -> Self {
		let kind = OpKind::UnlockChips {
			player: player.clone(),
			amount,
		};
		let op_player = player.clone();
		let rollback_player = player;
		self.steps.push(Step {
			kind,
			op: Box::new(move |ctx| ctx.balances.unlock(&op_player, amount, now_ms)),
			rollback: Box::new(move |ctx| ctx.balances.lock(&rollback_player, amount, now_ms)),
		});
		self
	}

	pub fn buy_in(mut self, table: TableId, player: PlayerId, amount: u64, now_ms: i64) -> Self {
		let kind = OpKind::BuyIn {
			table: table.clone(),
			player: player.clone(),
			amount,
		};
		let (op_table, op_player) = (table.clone(), player.clone());
		let (rb_table, rb_player) = (table, player);
		self.steps.push(Step {
			kind,
			op: Box::new(move |ctx| ctx.escrows.buy_in(ctx.balances, &op_table, &op_player, amount, now_ms)),
			rollback: Box::new(move |ctx| {
				ctx.escrows
					.cash_out(ctx.balances, &rb_table, &rb_player, Some(amount), now_ms)
					.map(|_| ())
			}),
		});
		self
	}

	pub fn cash_out(mut self, table: TableId, player: PlayerId, amount: u64, now_ms: i64) -> Self {
		let kind = OpKind::CashOut {
			table: table.clone(),
			player: player.clone(),
			amount,
		};
		let (op_table, op_player) = (table.clone(), player.clone());
		let (rb_table, rb_player) = (table, player);
		self.steps.push(Step {
			kind,
			op: Box::new(move |ctx| {
				ctx.escrows
					.cash_out(ctx.balances, &op_table, &op_player, Some(amount), now_ms)
					.map(|_| ())
			}),
			rollback: Box::new(move |ctx| ctx.escrows.buy_in(ctx.balances, &rb_table, &rb_player, amount, now_ms)),
		});
		self
	}

	pub fn commit_to_pot(mut self, table: TableId, player: PlayerId, amount: u64, now_ms: i64) -> Self {
		let kind = OpKind::CommitToPot {
			table: table.clone(),
			player: player.clone(),
			amount,
		};
		let (op_table, op_player) = (table.clone(), player.clone());
		let (rb_table, rb_player) = (table, player);
		self.steps.push(Step {
			kind,
			op: Box::new(move |ctx| ctx.escrows.commit_chips(&op_table, &op_player, amount, now_ms)),
			rollback: Box::new(move |ctx| {
				ctx.escrows
					.release_committed(&rb_table, &rb_player, Some(amount), now_ms)
					.map(|_| ())
			}),
		});
		self
	}

	/// Mid-hand pot contributions have no meaningful rollback: once chips
	/// are in the pot they belong to the hand, not the player. Registers a
	/// no-op rollback by design (spec §4.7); callers must only place this
	/// inside a transaction where a higher-level component (the Settlement
	/// Engine) guarantees idempotency.
	pub fn move_to_pot(mut self, table: TableId, player: PlayerId, amount: u64, now_ms: i64) -> Self {
		let kind = OpKind::MoveToPot {
			table: table.clone(),
			player: player.clone(),
			amount,
		};
		self.steps.push(Step {
			kind,
			op: Box::new(move |ctx| ctx.escrows.move_to_pot(ctx.balances, &table, &player, amount, now_ms)),
			rollback: no_op_rollback(),
		});
		self
	}

	/// No meaningful rollback during settlement; see `move_to_pot`.
	pub fn award_pot(mut self, table: TableId, player: PlayerId, amount: u64, now_ms: i64) -> Self {
		let kind = OpKind::AwardPot {
			table: table.clone(),
			player: player.clone(),
			amount,
		};
		self.steps.push(Step {
			kind,
			op: Box::new(move |ctx| ctx.escrows.award_pot(ctx.balances, &table, &player, amount, now_ms)),
			rollback: no_op_rollback(),
		});
		self
	}

	/// No meaningful rollback: rake has already left the pot by the time
	/// this step runs.
	pub fn collect_rake(mut self, table: TableId, hand: HandId, amount: u64, now_ms: i64) -> Self {
		let kind = OpKind::CollectRake {
			table: table.clone(),
			hand: hand.clone(),
			amount,
		};
		self.steps.push(Step {
			kind,
			op: Box::new(move |ctx| ctx.ledger.record_rake(table, hand, amount, now_ms).map(|_| ())),
			rollback: no_op_rollback(),
		});
		self
	}

	pub fn bet_action(
		mut self,
		table: TableId,
		player: PlayerId,
		amount: u64,
		street: Street,
		now_ms: i64,
	) -> Self {
		let kind = OpKind::BetAction {
			table: table.clone(),
			player: player.clone(),
			amount,
			street,
		};
		let (op_table, op_player) = (table.clone(), player.clone());
		let (rb_table, rb_player) = (table, player);
		self.steps.push(Step {
			kind,
			op: Box::new(move |ctx| ctx.escrows.commit_chips(&op_table, &op_player, amount, now_ms)),
			rollback: Box::new(move |ctx| {
				ctx.escrows
					.release_committed(&rb_table, &rb_player, Some(amount), now_ms)
					.map(|_| ())
			}),
		});
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
	Pending,
	Committed,
	RolledBack,
	Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
	pub transaction_id: TransactionId,
	pub hand_id: Option<HandId>,
	pub table_id: Option<TableId>,
	pub operations: Vec<OpKind>,
	pub status: TransactionStatus,
	pub created_at: i64,
	pub committed_at: Option<i64>,
	pub rolled_back_at: Option<i64>,
	pub error: Option<String>,
}

pub struct TransactionOutcome {
	pub success: bool,
	pub rollback_performed: bool,
	pub error: Option<String>,
	pub transaction: Transaction,
}

pub struct TransactionCoordinator {
	processed_keys: HashSet<String>,
	log: Vec<Transaction>,
	logging_enabled: bool,
}

impl TransactionCoordinator {
	pub fn new(logging_enabled: bool) -> Self {
		Self {
			processed_keys: HashSet::new(),
			log: Vec::new(),
			logging_enabled,
		}
	}

	pub fn has_processed(&self, key: &str) -> bool {
		self.processed_keys.contains(key)
	}

	pub fn commit(
		&mut self,
		builder: TransactionBuilder,
		ctx: &mut EconomyContext,
		now_ms: i64,
	) -> TransactionOutcome {
		let operations: Vec<OpKind> = builder.steps.iter().map(|s| s.kind.clone()).collect();

		if let Some(key) = &builder.idempotency_key {
			if self.processed_keys.contains(key) {
				let transaction = Transaction {
					transaction_id: builder.transaction_id,
					hand_id: builder.hand_id,
					table_id: builder.table_id,
					operations,
					status: TransactionStatus::Committed,
					created_at: now_ms,
					committed_at: Some(now_ms),
					rolled_back_at: None,
					error: Some("already processed".to_string()),
				};
				return TransactionOutcome {
					success: true,
					rollback_performed: false,
					error: Some("already processed".to_string()),
					transaction,
				};
			}
		}

		let mut executed_rollbacks: Vec<RollbackFn> = Vec::new();
		let mut failure: Option<EconomyError> = None;

		let mut steps = builder.steps;
		for step in steps.drain(..) {
			match (step.op)(ctx) {
				Ok(()) => executed_rollbacks.push(step.rollback),
				Err(e) => {
					failure = Some(e);
					break;
				}
			}
		}

		if let Some(err) = failure {
			for rollback in executed_rollbacks.into_iter().rev() {
				if let Err(rollback_err) = rollback(ctx) {
					log::error!(target: "transaction-coordinator", "rollback step failed, continuing: {rollback_err}");
				}
			}
			let transaction = Transaction {
				transaction_id: builder.transaction_id,
				hand_id: builder.hand_id,
				table_id: builder.table_id,
				operations,
				status: TransactionStatus::RolledBack,
				created_at: now_ms,
				committed_at: None,
				rolled_back_at: Some(now_ms),
				error: Some(err.to_string()),
			};
			if self.logging_enabled {
				self.log.push(transaction.clone());
			}
			return TransactionOutcome {
				success: false,
				rollback_performed: true,
				error: Some(err.to_string()),
				transaction,
			};
		}

		if let Some(key) = builder.idempotency_key {
			self.processed_keys.insert(key);
		}

		let transaction = Transaction {
			transaction_id: builder.transaction_id,
			hand_id: builder.hand_id,
			table_id: builder.table_id,
			operations,
			status: TransactionStatus::Committed,
			created_at: now_ms,
			committed_at: Some(now_ms),
			rolled_back_at: None,
			error: None,
		};
		if self.logging_enabled {
			self.log.push(transaction.clone());
		}
		log::info!(target: "transaction-coordinator", "committed transaction {}", transaction.transaction_id);
		TransactionOutcome {
			success: true,
			rollback_performed: false,
			error: None,
			transaction,
		}
	}

	/// Purges terminal (non-`Pending`) transactions older than `max_age_ms`.
	/// Pending transactions never appear in the log (we only log on a
	/// terminal outcome), so they are implicitly never purged.
	pub fn purge_old(&mut self, max_age_ms: i64, now_ms: i64) {
		self.log.retain(|t| now_ms - t.created_at < max_age_ms);
	}

	pub fn log(&self) -> &[Transaction] {
		&self.log
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ids::PlayerId;

	fn context<'a>(
		balances: &'a mut BalanceKeeper,
		escrows: &'a mut EscrowKeeper,
		ledger: &'a mut Ledger,
	) -> EconomyContext<'a> {
		EconomyContext {
			balances,
			escrows,
			ledger,
		}
	}

	#[test]
	fn successful_buy_in_commits() {
		let mut balances = BalanceKeeper::new();
		balances.initialize(PlayerId::new("a"), 1000, 0).unwrap();
		let mut escrows = EscrowKeeper::new();
		let mut ledger = Ledger::new();
		let mut coordinator = TransactionCoordinator::new(true);

		let builder = TransactionBuilder::new(TransactionId::new("txn_1")).buy_in(
			TableId::new("t1"),
			PlayerId::new("a"),
			500,
			1,
		);
		let mut ctx = context(&mut balances, &mut escrows, &mut ledger);
		let outcome = coordinator.commit(builder, &mut ctx, 1);
		assert!(outcome.success);
		assert_eq!(escrows.get(&TableId::new("t1"), &PlayerId::new("a")).unwrap().stack, 500);
	}

	#[test]
	fn failed_step_rolls_back_executed_steps() {
		let mut balances = BalanceKeeper::new();
		balances.initialize(PlayerId::new("a"), 100, 0).unwrap();
		let mut escrows = EscrowKeeper::new();
		let mut ledger = Ledger::new();
		let mut coordinator = TransactionCoordinator::new(true);

		// second buy-in exceeds the player's available balance and fails;
		// the first buy-in must be rolled back.
		let builder = TransactionBuilder::new(TransactionId::new("txn_2"))
			.buy_in(TableId::new("t1"), PlayerId::new("a"), 50, 1)
			.buy_in(TableId::new("t1"), PlayerId::new("a"), 500, 1);
		let mut ctx = context(&mut balances, &mut escrows, &mut ledger);
		let outcome = coordinator.commit(builder, &mut ctx, 1);
		assert!(!outcome.success);
		assert!(outcome.rollback_performed);
		assert_eq!(balances.get(&PlayerId::new("a")).unwrap().available, 100);
		assert!(escrows.get(&TableId::new("t1"), &PlayerId::new("a")).is_none());
	}

	#[test]
	fn idempotency_key_short_circuits_replay() {
		let mut balances = BalanceKeeper::new();
		balances.initialize(PlayerId::new("a"), 1000, 0).unwrap();
		let mut escrows = EscrowKeeper::new();
		let mut ledger = Ledger::new();
		let mut coordinator = TransactionCoordinator::new(true);

		let builder1 = TransactionBuilder::new(TransactionId::new("txn_3"))
			.with_idempotency_key("key-1")
			.buy_in(TableId::new("t1"), PlayerId::new("a"), 200, 1);
		{
			let mut ctx = context(&mut balances, &mut escrows, &mut ledger);
			coordinator.commit(builder1, &mut ctx, 1);
		}

		let builder2 = TransactionBuilder::new(TransactionId::new("txn_4"))
			.with_idempotency_key("key-1")
			.buy_in(TableId::new("t1"), PlayerId::new("a"), 200, 2);
		let mut ctx = context(&mut balances, &mut escrows, &mut ledger);
		let outcome = coordinator.commit(builder2, &mut ctx, 2);
		assert!(outcome.success);
		assert_eq!(outcome.error.as_deref(), Some("already processed"));
		// balance only reflects the first, executed buy-in.
		assert_eq!(escrows.get(&TableId::new("t1"), &PlayerId::new("a")).unwrap().stack, 200);
	}
}
