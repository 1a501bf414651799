//! Side-Pot Calculator (component 5): a pure function from contributions to
//! layered side pots, and from a ranking map to payouts with the odd-chip
//! rule. No state, no I/O — safe to call from `previewSettlement` as well as
//! from the real settlement path.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
	error::{EconomyError, EconomyResult},
	ids::PlayerId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerContribution {
	pub player: PlayerId,
	pub total_contribution: u64,
	pub is_all_in: bool,
	pub is_folded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidePotLayer {
	pub amount: u64,
	pub eligible_players: HashSet<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidePotResult {
	pub pots: Vec<SidePotLayer>,
	/// Players in ascending-contribution order, ties broken by input order —
	/// the "deterministic iteration order" odd-chip remainders are assigned
	/// against.
	pub ordered_players: Vec<PlayerId>,
}

/// Step 2-4 of spec §4.5.
pub fn calculate_side_pots(contributions: &[PlayerContribution]) -> SidePotResult {
	let mut filtered: Vec<&PlayerContribution> =
		contributions.iter().filter(|c| c.total_contribution > 0).collect();
	if filtered.is_empty() {
		return SidePotResult {
			pots: vec![],
			ordered_players: vec![],
		};
	}

	// Stable sort: ties keep their relative input order, which is the
	// "first eligible winner in sorted iteration order" tiebreak spec.md §4.5
	// and the S3 scenario rely on.
	filtered.sort_by_key(|c| c.total_contribution);

	let ordered_players: Vec<PlayerId> = filtered.iter().map(|c| c.player.clone()).collect();

	let mut levels: Vec<u64> = filtered.iter().map(|c| c.total_contribution).collect();
	levels.dedup();

	let mut pots = Vec::new();
	let mut prev_level = 0u64;
	for level in levels {
		let layer = level - prev_level;
		let at_or_above: Vec<&&PlayerContribution> =
			filtered.iter().filter(|c| c.total_contribution >= level).collect();
		let amount = layer * at_or_above.len() as u64;
		if amount > 0 {
			let eligible_players: HashSet<PlayerId> = at_or_above
				.iter()
				.filter(|c| !c.is_folded)
				.map(|c| c.player.clone())
				.collect();
			pots.push(SidePotLayer {
				amount,
				eligible_players,
			});
		}
		prev_level = level;
	}

	SidePotResult { pots, ordered_players }
}

/// Pure conservation check: §4.5's `Σ pots.amount = Σ player.totalContribution`.
pub fn verify_conservation(contributions: &[PlayerContribution], result: &SidePotResult) -> bool {
	let total_contrib: u64 = contributions.iter().map(|c| c.total_contribution).sum();
	let total_pots: u64 = result.pots.iter().map(|p| p.amount).sum();
	total_contrib == total_pots
}

/// Winner resolution + odd-chip payout for one hand's pot layout, given a
/// ranking map where the lowest rank wins and ties share.
pub fn settle_pots(
	result: &SidePotResult,
	winner_rankings: &BTreeMap<PlayerId, u32>,
) -> EconomyResult<BTreeMap<PlayerId, u64>> {
	let mut payouts: BTreeMap<PlayerId, u64> = BTreeMap::new();

	for pot in &result.pots {
		let mut best_rank: Option<u32> = None;
		for player in &pot.eligible_players {
			if let Some(rank) = winner_rankings.get(player) {
				best_rank = Some(match best_rank {
					Some(current) => current.min(*rank),
					None => *rank,
				});
			}
		}
		let best_rank = best_rank.ok_or_else(|| {
			// None of the eligible players for this pot have a ranking entry:
			// the hand engine must supply a rank for every contestant still
			// eligible at showdown.
			EconomyError::EligibilityViolation {
				player: pot
					.eligible_players
					.iter()
					.next()
					.cloned()
					.unwrap_or_else(|| PlayerId::new("<unknown>")),
			}
		})?;

		// Winners in deterministic iteration order.
		let winners: Vec<&PlayerId> = result
			.ordered_players
			.iter()
			.filter(|p| pot.eligible_players.contains(*p) && winner_rankings.get(*p) == Some(&best_rank))
			.collect();

		if winners.is_empty() {
			continue;
		}

		let per_winner = pot.amount / winners.len() as u64;
		let remainder = pot.amount - per_winner * winners.len() as u64;

		for (idx, winner) in winners.iter().enumerate() {
			let mut amount = per_winner;
			if idx == 0 {
				amount += remainder;
			}
			*payouts.entry((*winner).clone()).or_insert(0) += amount;
		}
	}

	Ok(payouts)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn contrib(player: &str, total: u64, folded: bool) -> PlayerContribution {
		PlayerContribution {
			player: PlayerId::new(player),
			total_contribution: total,
			is_all_in: false,
			is_folded: folded,
		}
	}

	#[test]
	fn s2_three_way_all_in_different_stacks() {
		let contributions = vec![contrib("a", 100, false), contrib("b", 200, false), contrib("c", 300, false)];
		let result = calculate_side_pots(&contributions);
		assert!(verify_conservation(&contributions, &result));
		assert_eq!(result.pots.len(), 3);
		assert_eq!(result.pots[0].amount, 300); // main pot: 100 * 3
		assert_eq!(result.pots[1].amount, 200); // side pot: 100 * 2
		assert_eq!(result.pots[2].amount, 100); // tail pot: 100 * 1

		let mut rankings = BTreeMap::new();
		rankings.insert(PlayerId::new("a"), 0);
		rankings.insert(PlayerId::new("b"), 1);
		rankings.insert(PlayerId::new("c"), 2);
		let payouts = settle_pots(&result, &rankings).unwrap();
		assert_eq!(payouts[&PlayerId::new("a")], 300);
		assert_eq!(payouts[&PlayerId::new("b")], 200);
		assert_eq!(payouts[&PlayerId::new("c")], 100);
	}

	#[test]
	fn s3_odd_chip_remainder_goes_to_lower_contributor() {
		let contributions = vec![contrib("winner_51", 51, false), contrib("winner_50", 50, false)];
		let result = calculate_side_pots(&contributions);
		assert_eq!(result.pots.len(), 1);
		assert_eq!(result.pots[0].amount, 101);

		let mut rankings = BTreeMap::new();
		rankings.insert(PlayerId::new("winner_51"), 0);
		rankings.insert(PlayerId::new("winner_50"), 0);
		let payouts = settle_pots(&result, &rankings).unwrap();
		// winner_50 sorts first in ascending contribution order, so the odd
		// chip lands there.
		assert_eq!(payouts[&PlayerId::new("winner_50")], 51);
		assert_eq!(payouts[&PlayerId::new("winner_51")], 50);
	}

	#[test]
	fn fold_removes_eligibility_but_keeps_layer_size() {
		let contributions = vec![contrib("a", 100, true), contrib("b", 100, false)];
		let result = calculate_side_pots(&contributions);
		assert_eq!(result.pots.len(), 1);
		assert_eq!(result.pots[0].amount, 200);
		assert!(!result.pots[0].eligible_players.contains(&PlayerId::new("a")));
		assert!(result.pots[0].eligible_players.contains(&PlayerId::new("b")));
	}

	#[test]
	fn empty_contributions_yield_no_pots() {
		let result = calculate_side_pots(&[]);
		assert!(result.pots.is_empty());
	}
}
