//! Ledger (component 4): append-only, hash-chained record of every monetary
//! event. Single-writer by construction (the hash chain is intrinsically
//! sequential); wrapped by its own actor in `economy-service`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
	error::{EconomyError, EconomyResult},
	ids::{settlement_idempotency_key, EntryId, HandId, PlayerId, SettlementId, TableId},
};

/// 64 zero characters: the `prevHash` of the very first entry in the chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
	Credit,
	Debit,
	Lock,
	Unlock,
	BuyIn,
	CashOut,
	Blind,
	Bet,
	CommitToPot,
	MoveToPot,
	PotWin,
	Rake,
}

impl EntryType {
	fn as_str(&self) -> &'static str {
		match self {
			EntryType::Credit => "credit",
			EntryType::Debit => "debit",
			EntryType::Lock => "lock",
			EntryType::Unlock => "unlock",
			EntryType::BuyIn => "buy_in",
			EntryType::CashOut => "cash_out",
			EntryType::Blind => "blind",
			EntryType::Bet => "bet",
			EntryType::CommitToPot => "commit_to_pot",
			EntryType::MoveToPot => "move_to_pot",
			EntryType::PotWin => "pot_win",
			EntryType::Rake => "rake",
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
	pub entry_id: EntryId,
	pub sequence: u64,
	pub entry_type: EntryType,
	pub player_id: Option<PlayerId>,
	/// Signed: negative when chips leave a player's accounting frame
	/// (debits, pot contributions), positive when they arrive (credits, pot
	/// wins, rake collected into the house account). A hand's entries sum
	/// to zero exactly when every chip that left a player has arrived
	/// somewhere else.
	pub amount: i64,
	pub reason: String,
	pub hand_id: Option<HandId>,
	pub table_id: Option<TableId>,
	pub balance_after: u64,
	pub metadata: BTreeMap<String, String>,
	pub prev_hash: String,
	pub hash: String,
	pub timestamp: i64,
}

impl LedgerEntry {
	/// Canonical byte serialization in the field order fixed by spec §6,
	/// excluding `hash` itself.
	fn canonical_bytes(&self) -> Vec<u8> {
		let mut buf = Vec::new();
		buf.extend(self.sequence.to_be_bytes());
		buf.extend(self.entry_id.as_str().as_bytes());
		buf.extend(self.timestamp.to_be_bytes());
		buf.extend(self.entry_type.as_str().as_bytes());
		if let Some(p) = &self.player_id {
			buf.extend(p.as_str().as_bytes());
		}
		buf.extend(self.amount.to_be_bytes());
		buf.extend(self.reason.as_bytes());
		if let Some(h) = &self.hand_id {
			buf.extend(h.as_str().as_bytes());
		}
		if let Some(t) = &self.table_id {
			buf.extend(t.as_str().as_bytes());
		}
		buf.extend(self.balance_after.to_be_bytes());
		for (k, v) in &self.metadata {
			buf.extend(k.as_bytes());
			buf.extend(v.as_bytes());
		}
		buf.extend(self.prev_hash.as_bytes());
		buf
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
	pub settlement_id: SettlementId,
	pub hand_id: HandId,
	pub table_id: TableId,
	pub timestamp: i64,
	pub total_pot: u64,
	pub rake_collected: u64,
	pub player_payouts: BTreeMap<PlayerId, u64>,
	pub referenced_entry_ids: Vec<EntryId>,
	pub idempotency_key: String,
}

pub struct AppendRequest {
	pub entry_type: EntryType,
	pub player_id: Option<PlayerId>,
	pub amount: i64,
	pub reason: String,
	pub hand_id: Option<HandId>,
	pub table_id: Option<TableId>,
	pub balance_after: u64,
	pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct Ledger {
	entries: Vec<LedgerEntry>,
	by_player: HashMap<PlayerId, Vec<usize>>,
	by_hand: HashMap<HandId, Vec<usize>>,
	by_table: HashMap<TableId, Vec<usize>>,
	settlements: HashMap<String, SettlementRecord>,
	next_entry_seq: u64,
	next_settlement_seq: u64,
}

impl Ledger {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn last(&self) -> Option<&LedgerEntry> {
		self.entries.last()
	}

	pub fn get(&self, index: usize) -> Option<&LedgerEntry> {
		self.entries.get(index)
	}

	pub fn all(&self) -> &[LedgerEntry] {
		&self.entries
	}

	pub fn for_player(&self, player: &PlayerId) -> Vec<&LedgerEntry> {
		self.by_player
			.get(player)
			.map(|idxs| idxs.iter().map(|&i| &self.entries[i]).collect())
			.unwrap_or_default()
	}

	pub fn for_hand(&self, hand: &HandId) -> Vec<&LedgerEntry> {
		self.by_hand
			.get(hand)
			.map(|idxs| idxs.iter().map(|&i| &self.entries[i]).collect())
			.unwrap_or_default()
	}

	pub fn for_table(&self, table: &TableId) -> Vec<&LedgerEntry> {
		self.by_table
			.get(table)
			.map(|idxs| idxs.iter().map(|&i| &self.entries[i]).collect())
			.unwrap_or_default()
	}

	pub fn append(&mut self, req: AppendRequest, now_ms: i64) -> EconomyResult<EntryId> {
		let sequence = self.entries.len() as u64;
		let prev_hash = self
			.entries
			.last()
			.map(|e| e.hash.clone())
			.unwrap_or_else(|| GENESIS_HASH.to_string());

		let entry_id = EntryId::new(format!("{}{}", EntryId::PREFIX, self.next_entry_seq));
		self.next_entry_seq += 1;

		let mut entry = LedgerEntry {
			entry_id: entry_id.clone(),
			sequence,
			entry_type: req.entry_type,
			player_id: req.player_id.clone(),
			amount: req.amount,
			reason: req.reason,
			hand_id: req.hand_id.clone(),
			table_id: req.table_id.clone(),
			balance_after: req.balance_after,
			metadata: req.metadata,
			prev_hash,
			hash: String::new(),
			timestamp: now_ms,
		};
		entry.hash = blake3::hash(&entry.canonical_bytes()).to_hex().to_string();

		let idx = self.entries.len();
		if let Some(p) = &req.player_id {
			self.by_player.entry(p.clone()).or_default().push(idx);
		}
		if let Some(h) = &req.hand_id {
			self.by_hand.entry(h.clone()).or_default().push(idx);
		}
		if let Some(t) = &req.table_id {
			self.by_table.entry(t.clone()).or_default().push(idx);
		}
		self.entries.push(entry);
		Ok(entry_id)
	}

	pub fn record_buy_in(
		&mut self,
		player: PlayerId,
		table: TableId,
		amount: u64,
		balance_after: u64,
		now_ms: i64,
	) -> EconomyResult<EntryId> {
		self.append(
			AppendRequest {
				entry_type: EntryType::BuyIn,
				player_id: Some(player.clone()),
				amount: amount as i64,
				reason: format!("buy-in of {amount} at table {table}"),
				hand_id: None,
				table_id: Some(table),
				balance_after,
				metadata: BTreeMap::new(),
			},
			now_ms,
		)
	}

	pub fn record_cash_out(
		&mut self,
		player: PlayerId,
		table: TableId,
		amount: u64,
		balance_after: u64,
		now_ms: i64,
	) -> EconomyResult<EntryId> {
		self.append(
			AppendRequest {
				entry_type: EntryType::CashOut,
				player_id: Some(player.clone()),
				amount: -(amount as i64),
				reason: format!("cash-out of {amount} from table {table}"),
				hand_id: None,
				table_id: Some(table),
				balance_after,
				metadata: BTreeMap::new(),
			},
			now_ms,
		)
	}

	pub fn record_blind(
		&mut self,
		player: PlayerId,
		table: TableId,
		hand: HandId,
		amount: u64,
		balance_after: u64,
		now_ms: i64,
	) -> EconomyResult<EntryId> {
		self.append(
			AppendRequest {
				entry_type: EntryType::Blind,
				player_id: Some(player.clone()),
				amount: -(amount as i64),
				reason: format!("blind of {amount} posted in hand {hand}"),
				hand_id: Some(hand),
				table_id: Some(table),
				balance_after,
				metadata: BTreeMap::new(),
			},
			now_ms,
		)
	}

	pub fn record_bet(
		&mut self,
		player: PlayerId,
		table: TableId,
		hand: HandId,
		amount: u64,
		balance_after: u64,
		now_ms: i64,
	) -> EconomyResult<EntryId> {
		self.append(
			AppendRequest {
				entry_type: EntryType::Bet,
				player_id: Some(player.clone()),
				amount: -(amount as i64),
				reason: format!("bet of {amount} in hand {hand}"),
				hand_id: Some(hand),
				table_id: Some(table),
				balance_after,
				metadata: BTreeMap::new(),
			},
			now_ms,
		)
	}

	/// A player's committed chips leaving their accounting frame and
	/// entering the hand's pot — the ledger counterpart of
	/// `EscrowKeeper::move_to_pot`, written once per contributor at
	/// settlement so the hand's entries net to zero alongside its pot-win
	/// and rake entries.
	pub fn record_move_to_pot(
		&mut self,
		player: PlayerId,
		table: TableId,
		hand: HandId,
		amount: u64,
		balance_after: u64,
		now_ms: i64,
	) -> EconomyResult<EntryId> {
		self.append(
			AppendRequest {
				entry_type: EntryType::MoveToPot,
				player_id: Some(player.clone()),
				amount: -(amount as i64),
				reason: format!("{amount} moved from escrow to pot in hand {hand}"),
				hand_id: Some(hand),
				table_id: Some(table),
				balance_after,
				metadata: BTreeMap::new(),
			},
			now_ms,
		)
	}

	pub fn record_pot_win(
		&mut self,
		player: PlayerId,
		table: TableId,
		hand: HandId,
		amount: u64,
		balance_after: u64,
		now_ms: i64,
	) -> EconomyResult<EntryId> {
		self.append(
			AppendRequest {
				entry_type: EntryType::PotWin,
				player_id: Some(player.clone()),
				amount: amount as i64,
				reason: format!("pot win of {amount} in hand {hand}"),
				hand_id: Some(hand),
				table_id: Some(table),
				balance_after,
				metadata: BTreeMap::new(),
			},
			now_ms,
		)
	}

	/// Books the rake amount as arriving at the synthetic `rake_account`
	/// (positive, like any other credit): the hand's pot leaves contributors'
	/// frames as a negative sum and arrives in full as payouts plus rake, so
	/// rake must carry the same sign as a pot win for the hand to net to
	/// zero.
	pub fn record_rake(
		&mut self,
		table: TableId,
		hand: HandId,
		amount: u64,
		now_ms: i64,
	) -> EconomyResult<EntryId> {
		self.append(
			AppendRequest {
				entry_type: EntryType::Rake,
				player_id: None,
				amount: amount as i64,
				reason: format!("rake of {amount} collected in hand {hand}"),
				hand_id: Some(hand),
				table_id: Some(table),
				balance_after: 0,
				metadata: BTreeMap::new(),
			},
			now_ms,
		)
	}

	/// Writes one settlement record referencing all entries produced during
	/// a settlement. Rejects a duplicate `(table, hand)` — spec §4.4,
	/// §3 invariant 5.
	pub fn record_settlement(
		&mut self,
		hand_id: HandId,
		table_id: TableId,
		total_pot: u64,
		rake_collected: u64,
		player_payouts: BTreeMap<PlayerId, u64>,
		referenced_entry_ids: Vec<EntryId>,
		now_ms: i64,
	) -> EconomyResult<SettlementRecord> {
		let idempotency_key = settlement_idempotency_key(&table_id, &hand_id);
		if self.settlements.contains_key(&idempotency_key) {
			return Err(EconomyError::DuplicateSettlement {
				table: table_id,
				hand: hand_id,
			});
		}

		let settlement_id = SettlementId::new(format!("{}{}", SettlementId::PREFIX, self.next_settlement_seq));
		self.next_settlement_seq += 1;

		let record = SettlementRecord {
			settlement_id,
			hand_id,
			table_id,
			timestamp: now_ms,
			total_pot,
			rake_collected,
			player_payouts,
			referenced_entry_ids,
			idempotency_key: idempotency_key.clone(),
		};
		self.settlements.insert(idempotency_key, record.clone());
		Ok(record)
	}

	pub fn settlement_for(&self, table: &TableId, hand: &HandId) -> Option<&SettlementRecord> {
		self.settlements.get(&settlement_idempotency_key(table, hand))
	}

	pub fn all_settlements(&self) -> impl Iterator<Item = &SettlementRecord> {
		self.settlements.values()
	}

	pub fn restore_settlement(&mut self, record: SettlementRecord) {
		self.settlements.insert(record.idempotency_key.clone(), record);
	}

	/// Walks the chain; returns the first broken sequence index, if any.
	pub fn verify_integrity(&self) -> (bool, Option<u64>) {
		let mut expected_prev = GENESIS_HASH.to_string();
		for entry in &self.entries {
			if entry.prev_hash != expected_prev {
				return (false, Some(entry.sequence));
			}
			let recomputed = blake3::hash(&entry.canonical_bytes()).to_hex().to_string();
			if recomputed != entry.hash {
				return (false, Some(entry.sequence));
			}
			expected_prev = entry.hash.clone();
		}
		(true, None)
	}

	/// Chip conservation within a hand: the signed sum of every entry
	/// attached to the hand (including its rake entry) must equal zero.
	pub fn verify_hand_conservation(&self, hand: &HandId) -> bool {
		let sum: i64 = self.for_hand(hand).iter().map(|e| e.amount).sum();
		sum == 0
	}

	pub fn clear(&mut self) {
		self.entries.clear();
		self.by_player.clear();
		self.by_hand.clear();
		self.by_table.clear();
		self.settlements.clear();
		self.next_entry_seq = 0;
		self.next_settlement_seq = 0;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chain_integrity_holds_across_appends() {
		let mut ledger = Ledger::new();
		ledger
			.record_buy_in(PlayerId::new("a"), TableId::new("t"), 500, 500, 1)
			.unwrap();
		ledger
			.record_buy_in(PlayerId::new("b"), TableId::new("t"), 300, 300, 2)
			.unwrap();
		let (valid, broken_at) = ledger.verify_integrity();
		assert!(valid);
		assert!(broken_at.is_none());
	}

	#[test]
	fn tampered_entry_breaks_integrity() {
		let mut ledger = Ledger::new();
		ledger
			.record_buy_in(PlayerId::new("a"), TableId::new("t"), 500, 500, 1)
			.unwrap();
		ledger.entries[0].amount = 999;
		let (valid, broken_at) = ledger.verify_integrity();
		assert!(!valid);
		assert_eq!(broken_at, Some(0));
	}

	#[test]
	fn duplicate_settlement_rejected() {
		let mut ledger = Ledger::new();
		let hand = HandId::new("h1");
		let table = TableId::new("t1");
		ledger
			.record_settlement(hand.clone(), table.clone(), 100, 5, BTreeMap::new(), vec![], 1)
			.unwrap();
		let err = ledger
			.record_settlement(hand, table, 100, 5, BTreeMap::new(), vec![], 2)
			.unwrap_err();
		assert!(matches!(err, EconomyError::DuplicateSettlement { .. }));
	}

	#[test]
	fn hand_conservation_sums_to_zero() {
		let mut ledger = Ledger::new();
		let hand = HandId::new("h1");
		let table = TableId::new("t1");
		ledger
			.record_bet(PlayerId::new("a"), table.clone(), hand.clone(), 100, 0, 1)
			.unwrap();
		ledger
			.record_pot_win(PlayerId::new("b"), table.clone(), hand.clone(), 95, 95, 2)
			.unwrap();
		ledger.record_rake(table, hand.clone(), 5, 3).unwrap();
		assert!(ledger.verify_hand_conservation(&hand));
	}
}
