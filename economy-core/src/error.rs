//! Error kinds shared across the economy core.
//!
//! The kinds mirror spec §7: Validation and Precondition errors carry no
//! side effects and are safe to retry; Idempotency errors indicate a prior
//! result is being returned instead of a fresh one; Fatal errors mean an
//! invariant has already been broken and the affected actor must halt new
//! writes until an operator recovers from a snapshot.
use thiserror::Error;

use crate::ids::{HandId, PlayerId, TableId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EconomyError {
	#[error("invalid amount: {reason}")]
	InvalidAmount { reason: String },

	#[error("invalid time window: {reason}")]
	InvalidTimeWindow { reason: String },

	#[error("invalid rake config: {reason}")]
	InvalidConfig { reason: String },

	#[error("invalid status transition: {reason}")]
	InvalidStatusTransition { reason: String },

	#[error("player {player} already has a balance")]
	DuplicateBalance { player: PlayerId },

	#[error("no balance exists for player {player}")]
	BalanceNotFound { player: PlayerId },

	#[error("player {player} has insufficient balance: requested {requested}, available {available}")]
	InsufficientBalance {
		player: PlayerId,
		requested: u64,
		available: u64,
	},

	#[error("escrow for table {table} player {player} is insufficient: requested {requested}, free {free}")]
	EscrowInsufficient {
		table: TableId,
		player: PlayerId,
		requested: u64,
		free: u64,
	},

	#[error("escrow not found for table {table} player {player}")]
	EscrowNotFound { table: TableId, player: PlayerId },

	#[error("pot for hand {hand} is already settled")]
	PotAlreadySettled { hand: HandId },

	#[error("rake config invalid: {reason}")]
	RakeConfigInvalid { reason: String },

	#[error("duplicate settlement for table {table} hand {hand}, returning prior result")]
	DuplicateSettlement { table: TableId, hand: HandId },

	#[error("duplicate recharge for idempotency key {key}")]
	DuplicateRecharge { key: String },

	#[error("ledger integrity violated at sequence {sequence}: {reason}")]
	LedgerIntegrity { sequence: u64, reason: String },

	#[error("chip conservation violated for hand {hand}: expected 0, got {delta}")]
	ChipConservation { hand: HandId, delta: i64 },

	#[error("eligibility violation: player {player} named as winner of a pot they are not eligible for")]
	EligibilityViolation { player: PlayerId },

	#[error("transaction timed out after {elapsed_ms}ms")]
	TransactionTimeout { elapsed_ms: u64 },

	#[error("snapshot checksum mismatch: expected {expected}, got {actual}")]
	SnapshotChecksumMismatch { expected: String, actual: String },
}

impl EconomyError {
	/// `true` for the Fatal error class of spec §7: the invariants have
	/// already been broken and the component must halt new writes.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			EconomyError::LedgerIntegrity { .. } | EconomyError::ChipConservation { .. }
		)
	}
}

pub type EconomyResult<T> = Result<T, EconomyError>;
