//! Domain library for the economy core of a multi-club online card-room
//! backend: balances, per-table escrows, hand pots, the hash-chained
//! ledger, side-pot and rake calculation, atomic transactions, hand
//! settlement, and snapshot/recovery.
//!
//! Every public function here is synchronous and side-effect-free beyond
//! the in-memory state it owns — no I/O, no async runtime. The crate is
//! designed to be driven from a single-writer actor per component (see
//! `economy-service`), which is why every mutating method takes an
//! explicit `now_ms` rather than reading a wall clock.

pub mod balance;
pub mod clock;
pub mod error;
pub mod escrow;
pub mod ids;
pub mod ledger;
pub mod pot;
pub mod rake;
pub mod settlement;
pub mod sidepot;
pub mod snapshot;
pub mod transaction;

pub use balance::{BalanceKeeper, PlayerBalance};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{EconomyError, EconomyResult};
pub use escrow::{EscrowKeeper, TableEscrow};
pub use ids::{
	settlement_idempotency_key, ClubId, EntryId, HandId, PlayerId, PotId, SettlementId, SnapshotId, TableId,
	TransactionId,
};
pub use ledger::{EntryType, Ledger, LedgerEntry, SettlementRecord};
pub use pot::{Pot, PotBuilder, Street};
pub use rake::{RakeConfig, RakeEvaluation, RakeEvaluator, RakeTier, RakeWaiver, StreetOverride};
pub use settlement::{PlayerHandState, SettlementEngine, SettlementOutcome, SettlementRequest, RAKE_ACCOUNT};
pub use sidepot::{calculate_side_pots, settle_pots, PlayerContribution, SidePotLayer, SidePotResult};
pub use snapshot::{verify_invariants, EconomySnapshot, InvariantCheck, SnapshotHeader, SnapshotManager};
pub use transaction::{
	EconomyContext, OpKind, Transaction, TransactionBuilder, TransactionCoordinator, TransactionOutcome,
	TransactionStatus,
};
