//! Pot Builder (component 3): per-hand contributions, street by street.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
	error::{EconomyError, EconomyResult},
	ids::{HandId, PlayerId, PotId, TableId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Street {
	PreFlop,
	Flop,
	Turn,
	River,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pot {
	pub pot_id: PotId,
	pub hand_id: HandId,
	pub table_id: TableId,
	pub contributions_by_street: BTreeMap<Street, BTreeMap<PlayerId, u64>>,
	pub contributions_by_player: BTreeMap<PlayerId, u64>,
	pub eligible_players: HashSet<PlayerId>,
	pub is_settled: bool,
}

impl Pot {
	pub fn new(pot_id: PotId, hand_id: HandId, table_id: TableId) -> Self {
		Self {
			pot_id,
			hand_id,
			table_id,
			contributions_by_street: BTreeMap::new(),
			contributions_by_player: BTreeMap::new(),
			eligible_players: HashSet::new(),
			is_settled: false,
		}
	}

	pub fn add_contribution(&mut self, player: &PlayerId, amount: u64, street: Street) -> EconomyResult<()> {
		if self.is_settled {
			return Err(EconomyError::PotAlreadySettled {
				hand: self.hand_id.clone(),
			});
		}
		*self
			.contributions_by_street
			.entry(street)
			.or_default()
			.entry(player.clone())
			.or_insert(0) += amount;
		*self.contributions_by_player.entry(player.clone()).or_insert(0) += amount;
		self.eligible_players.insert(player.clone());
		Ok(())
	}

	/// Removes the player from the eligible set; their contribution total is
	/// preserved so side-pot layering stays correct.
	pub fn player_folded(&mut self, player: &PlayerId) {
		self.eligible_players.remove(player);
	}

	pub fn get_total(&self) -> u64 {
		self.contributions_by_player.values().sum()
	}

	pub fn get_player_contribution(&self, player: &PlayerId) -> u64 {
		self.contributions_by_player.get(player).copied().unwrap_or(0)
	}

	pub fn get_street_total(&self, street: Street) -> u64 {
		self.contributions_by_street
			.get(&street)
			.map(|m| m.values().sum())
			.unwrap_or(0)
	}

	pub fn mark_settled(&mut self) {
		self.is_settled = true;
	}
}

/// Single-writer owner of the live pots, one per open hand, reachable by
/// `(table, hand)`.
#[derive(Debug, Default)]
pub struct PotBuilder {
	pots: HashMap<(TableId, HandId), Pot>,
}

impl PotBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn open_hand(&mut self, pot_id: PotId, table: TableId, hand: HandId) -> &mut Pot {
		self.pots
			.entry((table.clone(), hand.clone()))
			.or_insert_with(|| Pot::new(pot_id, hand, table))
	}

	pub fn get(&self, table: &TableId, hand: &HandId) -> Option<&Pot> {
		self.pots.get(&(table.clone(), hand.clone()))
	}

	pub fn get_mut(&mut self, table: &TableId, hand: &HandId) -> Option<&mut Pot> {
		self.pots.get_mut(&(table.clone(), hand.clone()))
	}

	/// Discards a pot once its settlement has been logged (§4.3).
	pub fn discard(&mut self, table: &TableId, hand: &HandId) {
		self.pots.remove(&(table.clone(), hand.clone()));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fold_preserves_contribution_total() {
		let mut pot = Pot::new(PotId::new("p1"), HandId::new("h1"), TableId::new("t1"));
		let a = PlayerId::new("a");
		pot.add_contribution(&a, 50, Street::Flop).unwrap();
		pot.player_folded(&a);
		assert_eq!(pot.get_player_contribution(&a), 50);
		assert!(!pot.eligible_players.contains(&a));
	}

	#[test]
	fn add_contribution_rejects_after_settled() {
		let mut pot = Pot::new(PotId::new("p1"), HandId::new("h1"), TableId::new("t1"));
		pot.mark_settled();
		let err = pot
			.add_contribution(&PlayerId::new("a"), 10, Street::PreFlop)
			.unwrap_err();
		assert!(matches!(err, EconomyError::PotAlreadySettled { .. }));
	}
}
