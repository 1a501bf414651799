//! Snapshot/Recovery (component 9): periodic coherent snapshot of balances,
//! escrows and settlement history, with verify-and-restore on startup.

use serde::{Deserialize, Serialize};

use crate::{
	balance::{BalanceKeeper, PlayerBalance},
	error::{EconomyError, EconomyResult},
	escrow::{EscrowKeeper, TableEscrow},
	ledger::{Ledger, SettlementRecord},
	ids::SnapshotId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
	pub version: u64,
	pub snapshot_id: SnapshotId,
	pub timestamp: i64,
	pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomySnapshot {
	pub header: SnapshotHeader,
	/// Sorted by `playerId` so the checksum is a function of content, not
	/// hash-map iteration order.
	pub balances: Vec<PlayerBalance>,
	/// Sorted by `(tableId, playerId)`.
	pub escrows: Vec<TableEscrow>,
	/// Sorted by `(tableId, handId)`.
	pub settlement_history: Vec<SettlementRecord>,
}

impl EconomySnapshot {
	/// Canonical byte serialization of everything but the checksum itself,
	/// in the order fixed by spec §6: header-without-checksum, then
	/// balances, escrows, settlement history.
	fn canonical_bytes(
		version: u64,
		snapshot_id: &SnapshotId,
		timestamp: i64,
		balances: &[PlayerBalance],
		escrows: &[TableEscrow],
		settlement_history: &[SettlementRecord],
	) -> Vec<u8> {
		#[derive(Serialize)]
		struct Canonical<'a> {
			version: u64,
			snapshot_id: &'a SnapshotId,
			timestamp: i64,
			balances: &'a [PlayerBalance],
			escrows: &'a [TableEscrow],
			settlement_history: &'a [SettlementRecord],
		}
		serde_json::to_vec(&Canonical {
			version,
			snapshot_id,
			timestamp,
			balances,
			escrows,
			settlement_history,
		})
		.expect("snapshot contents always serialize")
	}

	fn compute_checksum(
		version: u64,
		snapshot_id: &SnapshotId,
		timestamp: i64,
		balances: &[PlayerBalance],
		escrows: &[TableEscrow],
		settlement_history: &[SettlementRecord],
	) -> String {
		let bytes = Self::canonical_bytes(version, snapshot_id, timestamp, balances, escrows, settlement_history);
		blake3::hash(&bytes).to_hex().to_string()
	}

	pub fn verify_checksum(&self) -> bool {
		let recomputed = Self::compute_checksum(
			self.header.version,
			&self.header.snapshot_id,
			self.header.timestamp,
			&self.balances,
			&self.escrows,
			&self.settlement_history,
		);
		recomputed == self.header.checksum
	}
}

/// Takes coherent, checksummed point-in-time captures of the economy's
/// durable state and restores them on recovery. Snapshot creation is
/// serialized against writes by virtue of holding `&BalanceKeeper` /
/// `&EscrowKeeper` / `&Ledger` references for the duration of the capture
/// (§5: asking each actor, in order, for a read-only copy).
#[derive(Debug, Default)]
pub struct SnapshotManager {
	retained: Vec<EconomySnapshot>,
	retention: usize,
	next_version: u64,
	next_snapshot_seq: u64,
}

impl SnapshotManager {
	pub fn new(retention: usize) -> Self {
		Self {
			retained: Vec::new(),
			retention: retention.max(1),
			next_version: 0,
			next_snapshot_seq: 0,
		}
	}

	pub fn create_snapshot(
		&mut self,
		balances: &BalanceKeeper,
		escrows: &EscrowKeeper,
		ledger: &Ledger,
		now_ms: i64,
	) -> EconomySnapshot {
		let mut balance_list: Vec<PlayerBalance> = balances.iter().cloned().collect();
		balance_list.sort_by(|a, b| a.player_id.cmp(&b.player_id));

		let mut escrow_list: Vec<TableEscrow> = escrows.iter().cloned().collect();
		escrow_list.sort_by(|a, b| (&a.table_id, &a.player_id).cmp(&(&b.table_id, &b.player_id)));

		let mut settlement_list: Vec<SettlementRecord> = ledger.all_settlements().cloned().collect();
		settlement_list.sort_by(|a, b| (&a.table_id, &a.hand_id).cmp(&(&b.table_id, &b.hand_id)));

		let version = self.next_version;
		self.next_version += 1;
		let snapshot_id = SnapshotId::new(format!("{}{}", SnapshotId::PREFIX, self.next_snapshot_seq));
		self.next_snapshot_seq += 1;

		let checksum = EconomySnapshot::compute_checksum(
			version,
			&snapshot_id,
			now_ms,
			&balance_list,
			&escrow_list,
			&settlement_list,
		);

		let snapshot = EconomySnapshot {
			header: SnapshotHeader {
				version,
				snapshot_id,
				timestamp: now_ms,
				checksum,
			},
			balances: balance_list,
			escrows: escrow_list,
			settlement_history: settlement_list,
		};

		self.retained.push(snapshot.clone());
		if self.retained.len() > self.retention {
			self.retained.remove(0);
		}

		log::info!(
			target: "snapshot-recovery",
			"created snapshot {} (version {})",
			snapshot.header.snapshot_id,
			snapshot.header.version,
		);

		snapshot
	}

	pub fn latest(&self) -> Option<&EconomySnapshot> {
		self.retained.last()
	}

	pub fn retained(&self) -> &[EconomySnapshot] {
		&self.retained
	}

	/// Rebuilds `BalanceKeeper`, `EscrowKeeper` and the ledger's settlement
	/// history from `snapshot`. Clears both keepers first. Balances are
	/// rebuilt by creating with `available`, then crediting+locking
	/// `locked`, then crediting+moving-to-pending `pending`, so all three
	/// buckets come back correctly. Escrows use the privileged
	/// `restore_escrow` path directly, since a normal `buy_in` would
	/// re-lock chips that step 3 already locked (spec §4.9).
	pub fn recover_from_snapshot(
		snapshot: &EconomySnapshot,
		balances: &mut BalanceKeeper,
		escrows: &mut EscrowKeeper,
		ledger: &mut Ledger,
		verify_on_recovery: bool,
	) -> EconomyResult<()> {
		if verify_on_recovery && !snapshot.verify_checksum() {
			return Err(EconomyError::SnapshotChecksumMismatch {
				expected: snapshot.header.checksum.clone(),
				actual: EconomySnapshot::compute_checksum(
					snapshot.header.version,
					&snapshot.header.snapshot_id,
					snapshot.header.timestamp,
					&snapshot.balances,
					&snapshot.escrows,
					&snapshot.settlement_history,
				),
			});
		}

		balances.clear();
		escrows.clear();

		for balance in &snapshot.balances {
			balances.initialize(balance.player_id.clone(), balance.available, balance.created_at)?;
			if balance.locked > 0 {
				balances.credit(&balance.player_id, balance.locked, balance.updated_at)?;
				balances.lock(&balance.player_id, balance.locked, balance.updated_at)?;
			}
			if balance.pending > 0 {
				balances.credit(&balance.player_id, balance.pending, balance.updated_at)?;
				balances.move_to_pending(&balance.player_id, balance.pending, balance.updated_at)?;
			}
		}

		for escrow in &snapshot.escrows {
			escrows.restore_escrow(escrow.clone());
		}

		for record in &snapshot.settlement_history {
			ledger.restore_settlement(record.clone());
		}

		log::info!(
			target: "snapshot-recovery",
			"recovered from snapshot {} (version {})",
			snapshot.header.snapshot_id,
			snapshot.header.version,
		);

		Ok(())
	}
}

/// Result of `verifyInvariants()` (spec §6): one entry per invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheck {
	pub invariant: String,
	pub valid: bool,
	pub details: Option<String>,
}

pub fn verify_invariants(balances: &BalanceKeeper, escrows: &EscrowKeeper, ledger: &Ledger) -> Vec<InvariantCheck> {
	let mut checks = Vec::new();

	checks.push(InvariantCheck {
		invariant: "no_negative_balances".to_string(),
		valid: balances.verify_no_negative_balances(),
		details: None,
	});

	let total_chips = balances.total_chips();
	checks.push(InvariantCheck {
		invariant: "balance_conservation".to_string(),
		valid: total_chips <= u128::from(u64::MAX),
		details: Some(format!("total_chips={total_chips}")),
	});

	let mismatches = escrows.locked_matches_escrow(balances);
	checks.push(InvariantCheck {
		invariant: "locked_matches_escrow".to_string(),
		valid: mismatches.is_empty(),
		details: if mismatches.is_empty() {
			None
		} else {
			Some(format!("{} player(s) mismatched", mismatches.len()))
		},
	});

	checks.push(InvariantCheck {
		invariant: "escrow_consistency".to_string(),
		valid: escrows.iter().all(|e| e.committed <= e.stack),
		details: None,
	});

	let (valid, broken_at) = ledger.verify_integrity();
	checks.push(InvariantCheck {
		invariant: "ledger_integrity".to_string(),
		valid,
		details: broken_at.map(|seq| format!("broken at sequence {seq}")),
	});

	checks
}
