//! Settlement Engine (component 8): orchestrates side-pot calculation, rake
//! evaluation, escrow crediting and ledger recording for one completed hand.
//! Idempotent by `(table, hand)` — spec §4.8.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
	clock::Clock,
	error::{EconomyError, EconomyResult},
	ids::{settlement_idempotency_key, EntryId, HandId, PlayerId, SettlementId, TableId},
	ledger::{Ledger, SettlementRecord},
	pot::{PotBuilder, Street},
	rake::{RakeConfig, RakeEvaluation, RakeEvaluator, RakeTier},
	sidepot::{calculate_side_pots, settle_pots, PlayerContribution, SidePotResult},
	transaction::{EconomyContext, TransactionBuilder, TransactionCoordinator},
};

#[derive(Debug, Clone)]
pub struct PlayerHandState {
	pub player: PlayerId,
	pub total_bet: u64,
	pub is_all_in: bool,
	pub is_folded: bool,
}

#[derive(Debug, Clone)]
pub struct SettlementRequest {
	pub hand_id: HandId,
	pub table_id: TableId,
	pub player_states: Vec<PlayerHandState>,
	/// Lowest rank wins; ties share the pot.
	pub winner_rankings: BTreeMap<PlayerId, u32>,
	pub final_street: Street,
	pub flop_seen: bool,
	pub is_uncontested: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementOutcome {
	pub settlement_id: SettlementId,
	pub hand_id: HandId,
	pub table_id: TableId,
	pub total_pot: u64,
	pub rake_collected: u64,
	pub payouts: BTreeMap<PlayerId, u64>,
	pub replayed: bool,
}

/// Synthetic player id the rake amount is booked against in the ledger — no
/// real balance exists for it, it exists only so rake collection appears as
/// a normal signed ledger entry rather than a special case.
pub const RAKE_ACCOUNT: &str = "rake_account";

pub struct SettlementEngine;

impl SettlementEngine {
	/// Pure preview: runs the side-pot layout and rake evaluation without
	/// touching any state. Useful for UIs that want to show "what would the
	/// payout be" before the hand actually ends.
	pub fn preview_settlement(
		request: &SettlementRequest,
		rake_config: &RakeConfig,
		rake_tiers: &[RakeTier],
		clock: &dyn Clock,
	) -> EconomyResult<(SidePotResult, BTreeMap<PlayerId, u64>, RakeEvaluation)> {
		let (side_pots, raw_payouts, total_pot) = Self::layout_and_raw_payouts(request)?;
		let rake_eval = RakeEvaluator::evaluate(
			rake_config,
			rake_tiers,
			total_pot,
			request.final_street,
			request.flop_seen,
			request.is_uncontested,
			clock,
		);
		Ok((side_pots, raw_payouts, rake_eval))
	}

	fn layout_and_raw_payouts(
		request: &SettlementRequest,
	) -> EconomyResult<(SidePotResult, BTreeMap<PlayerId, u64>, u64)> {
		let contributions: Vec<PlayerContribution> = request
			.player_states
			.iter()
			.map(|p| PlayerContribution {
				player: p.player.clone(),
				total_contribution: p.total_bet,
				is_all_in: p.is_all_in,
				is_folded: p.is_folded,
			})
			.collect();

		let side_pots = calculate_side_pots(&contributions);
		let total_pot: u64 = contributions.iter().map(|c| c.total_contribution).sum();
		let raw_payouts = settle_pots(&side_pots, &request.winner_rankings)?;
		Ok((side_pots, raw_payouts, total_pot))
	}

	/// Scales raw (pre-rake) payouts down to `pot_after_rake`, flooring each
	/// share and assigning the remainder to the first player with a
	/// positive floored payout in `ordered_players` iteration order — spec
	/// §4.8 step 5.
	fn scale_payouts_for_rake(
		raw_payouts: &BTreeMap<PlayerId, u64>,
		total_pot: u64,
		pot_after_rake: u64,
		ordered_players: &[PlayerId],
	) -> BTreeMap<PlayerId, u64> {
		if total_pot == 0 {
			return BTreeMap::new();
		}

		let mut scaled: BTreeMap<PlayerId, u64> = BTreeMap::new();
		let mut floored_sum: u64 = 0;
		for (player, raw) in raw_payouts {
			let share = (*raw as u128 * pot_after_rake as u128 / total_pot as u128) as u64;
			floored_sum += share;
			scaled.insert(player.clone(), share);
		}

		let remainder = pot_after_rake - floored_sum;
		if remainder > 0 {
			let first_positive = ordered_players
				.iter()
				.find(|p| scaled.get(*p).copied().unwrap_or(0) > 0)
				.or_else(|| raw_payouts.keys().next());
			if let Some(player) = first_positive {
				*scaled.entry(player.clone()).or_insert(0) += remainder;
			}
		}

		scaled
	}

	/// Runs the full settlement for one hand. Idempotent: a prior
	/// `SettlementRecord` for `(table, hand)` is detected and its outcome
	/// returned verbatim without re-executing any operation or writing any
	/// additional ledger entry.
	#[allow(clippy::too_many_arguments)]
	pub fn settle_hand(
		request: SettlementRequest,
		rake_config: &RakeConfig,
		rake_tiers: &[RakeTier],
		pots: &mut PotBuilder,
		ctx: &mut EconomyContext,
		coordinator: &mut TransactionCoordinator,
		clock: &dyn Clock,
	) -> EconomyResult<SettlementOutcome> {
		let idempotency_key = settlement_idempotency_key(&request.table_id, &request.hand_id);

		if let Some(prior) = ctx.ledger.settlement_for(&request.table_id, &request.hand_id) {
			log::info!(
				target: "settlement-engine",
				"replaying prior settlement for table {} hand {}",
				request.table_id,
				request.hand_id,
			);
			return Ok(Self::outcome_from_record(prior.clone(), true));
		}

		let now_ms = clock.now_ms();
		let (side_pots, raw_payouts, total_pot) = Self::layout_and_raw_payouts(&request)?;

		let rake_eval = RakeEvaluator::evaluate(
			rake_config,
			rake_tiers,
			total_pot,
			request.final_street,
			request.flop_seen,
			request.is_uncontested,
			clock,
		);

		let payouts = Self::scale_payouts_for_rake(
			&raw_payouts,
			total_pot,
			rake_eval.pot_after_rake,
			&side_pots.ordered_players,
		);

		// Record each contributor's chips leaving their accounting frame and
		// entering the pot before the pot is paid back out, so the hand's
		// ledger entries net to zero once the payout and rake entries below
		// are appended. This is the ledger counterpart of the moves the
		// escrow already went through during betting (spec §1(d)
		// auditability).
		let mut referenced_entry_ids: Vec<EntryId> = Vec::new();
		for player_state in &request.player_states {
			if player_state.total_bet == 0 {
				continue;
			}
			let balance_after = ctx
				.escrows
				.get(&request.table_id, &player_state.player)
				.map(|e| e.stack)
				.unwrap_or(0);
			let entry_id = ctx.ledger.record_move_to_pot(
				player_state.player.clone(),
				request.table_id.clone(),
				request.hand_id.clone(),
				player_state.total_bet,
				balance_after,
				now_ms,
			)?;
			referenced_entry_ids.push(entry_id);
		}

		let mut builder = TransactionBuilder::new(crate::ids::TransactionId::new(format!(
			"settlement-{idempotency_key}"
		)))
		.for_hand(request.hand_id.clone())
		.for_table(request.table_id.clone())
		.with_idempotency_key(format!("settlement::{idempotency_key}"));

		for (player, amount) in &payouts {
			if *amount > 0 {
				builder = builder.award_pot(request.table_id.clone(), player.clone(), *amount, now_ms);
			}
		}

		let outcome = coordinator.commit(builder, ctx, now_ms);
		if !outcome.success {
			return Err(EconomyError::InvalidStatusTransition {
				reason: outcome
					.error
					.unwrap_or_else(|| "settlement transaction failed with no error detail".to_string()),
			});
		}

		for (player, amount) in &payouts {
			if *amount == 0 {
				continue;
			}
			let balance_after = ctx
				.escrows
				.get(&request.table_id, player)
				.map(|e| e.stack)
				.unwrap_or(0);
			let entry_id = ctx
				.ledger
				.record_pot_win(player.clone(), request.table_id.clone(), request.hand_id.clone(), *amount, balance_after, now_ms)?;
			referenced_entry_ids.push(entry_id);
		}
		if rake_eval.rake_amount > 0 {
			let entry_id = ctx.ledger.record_rake(
				request.table_id.clone(),
				request.hand_id.clone(),
				rake_eval.rake_amount,
				now_ms,
			)?;
			referenced_entry_ids.push(entry_id);
		}

		let record = ctx.ledger.record_settlement(
			request.hand_id.clone(),
			request.table_id.clone(),
			total_pot,
			rake_eval.rake_amount,
			payouts.clone(),
			referenced_entry_ids,
			now_ms,
		)?;

		if let Some(pot) = pots.get_mut(&request.table_id, &request.hand_id) {
			pot.mark_settled();
		}

		if !ctx.ledger.verify_hand_conservation(&request.hand_id) {
			return Err(EconomyError::ChipConservation {
				hand: request.hand_id.clone(),
				delta: side_pots.pots.iter().map(|p| p.amount as i64).sum::<i64>()
					- payouts.values().map(|v| *v as i64).sum::<i64>()
					- rake_eval.rake_amount as i64,
			});
		}

		log::info!(
			target: "settlement-engine",
			"settlement_completed table={} hand={} pot={} rake={}",
			request.table_id,
			request.hand_id,
			total_pot,
			rake_eval.rake_amount,
		);

		Ok(Self::outcome_from_record(record, false))
	}

	/// `settleUncontested`: all chips go to one eligible winner. Rake is
	/// evaluated with `is_uncontested = true` (usually waived by
	/// `exclude_uncontested`).
	#[allow(clippy::too_many_arguments)]
	pub fn settle_uncontested(
		hand_id: HandId,
		table_id: TableId,
		winner: PlayerId,
		pot_total: u64,
		final_street: Street,
		flop_seen: bool,
		rake_config: &RakeConfig,
		rake_tiers: &[RakeTier],
		pots: &mut PotBuilder,
		ctx: &mut EconomyContext,
		coordinator: &mut TransactionCoordinator,
		clock: &dyn Clock,
	) -> EconomyResult<SettlementOutcome> {
		let mut rankings = BTreeMap::new();
		rankings.insert(winner.clone(), 0);
		let request = SettlementRequest {
			hand_id,
			table_id,
			player_states: vec![PlayerHandState {
				player: winner,
				total_bet: pot_total,
				is_all_in: false,
				is_folded: false,
			}],
			winner_rankings: rankings,
			final_street,
			flop_seen,
			is_uncontested: true,
		};
		Self::settle_hand(
			request,
			rake_config,
			rake_tiers,
			pots,
			ctx,
			coordinator,
			clock,
		)
	}

	fn outcome_from_record(record: SettlementRecord, replayed: bool) -> SettlementOutcome {
		SettlementOutcome {
			settlement_id: record.settlement_id,
			hand_id: record.hand_id,
			table_id: record.table_id,
			total_pot: record.total_pot,
			rake_collected: record.rake_collected,
			payouts: record.player_payouts,
			replayed,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		balance::BalanceKeeper, clock::FixedClock, escrow::EscrowKeeper, ledger::Ledger,
		transaction::EconomyContext,
	};

	fn zero_rake_config() -> RakeConfig {
		RakeConfig {
			policy_id: "zero".into(),
			default_percentage: 0,
			default_cap: 0,
			no_flop_no_rake: false,
			exclude_uncontested: false,
			min_pot_for_rake: 0,
			street_overrides: BTreeMap::new(),
			waiver: None,
		}
	}

	fn standard_rake_config(pct: u32) -> RakeConfig {
		RakeConfig {
			policy_id: "standard".into(),
			default_percentage: pct,
			default_cap: 0,
			no_flop_no_rake: false,
			exclude_uncontested: false,
			min_pot_for_rake: 0,
			street_overrides: BTreeMap::new(),
			waiver: None,
		}
	}

	struct Harness {
		balances: BalanceKeeper,
		escrows: EscrowKeeper,
		pots: PotBuilder,
		ledger: Ledger,
		coordinator: TransactionCoordinator,
	}

	impl Harness {
		fn new() -> Self {
			Self {
				balances: BalanceKeeper::new(),
				escrows: EscrowKeeper::new(),
				pots: PotBuilder::new(),
				ledger: Ledger::new(),
				coordinator: TransactionCoordinator::new(true),
			}
		}
	}

	#[test]
	fn s1_heads_up_no_rake_single_winner() {
		let mut h = Harness::new();
		let a = PlayerId::new("a");
		let b = PlayerId::new("b");
		h.balances.initialize(a.clone(), 1000, 0).unwrap();
		h.balances.initialize(b.clone(), 1000, 0).unwrap();
		h.escrows.buy_in(&mut h.balances, &TableId::new("t1"), &a, 500, 0).unwrap();
		h.escrows.buy_in(&mut h.balances, &TableId::new("t1"), &b, 500, 0).unwrap();

		let table = TableId::new("t1");
		let hand = HandId::new("h1");
		h.pots.open_hand(crate::ids::PotId::new("p1"), table.clone(), hand.clone());

		// Simulate the betting rounds that already moved each player's total
		// contribution out of their escrow stack and into the pot, exactly
		// as the Transaction Coordinator would have during the hand.
		h.escrows.commit_chips(&table, &a, 85, 1).unwrap();
		h.escrows.move_to_pot(&mut h.balances, &table, &a, 85, 1).unwrap();
		h.escrows.commit_chips(&table, &b, 35, 1).unwrap();
		h.escrows.move_to_pot(&mut h.balances, &table, &b, 35, 1).unwrap();

		let request = SettlementRequest {
			hand_id: hand.clone(),
			table_id: table.clone(),
			player_states: vec![
				PlayerHandState {
					player: a.clone(),
					total_bet: 85,
					is_all_in: false,
					is_folded: false,
				},
				PlayerHandState {
					player: b.clone(),
					total_bet: 35,
					is_all_in: false,
					is_folded: true,
				},
			],
			winner_rankings: {
				let mut m = BTreeMap::new();
				m.insert(a.clone(), 0);
				m
			},
			final_street: Street::River,
			flop_seen: true,
			is_uncontested: false,
		};

		let config = standard_rake_config(5);
		let clock = FixedClock(0);
		let mut ctx = EconomyContext {
			balances: &mut h.balances,
			escrows: &mut h.escrows,
			ledger: &mut h.ledger,
		};
		let outcome = SettlementEngine::settle_hand(
			request,
			&config,
			&[],
			&mut h.pots,
			&mut ctx,
			&mut h.coordinator,
			&clock,
		)
		.unwrap();

		assert_eq!(outcome.total_pot, 120);
		assert_eq!(outcome.rake_collected, 6);
		assert_eq!(outcome.payouts[&a], 114);
		assert_eq!(h.escrows.get(&table, &a).unwrap().stack, 529);
		assert_eq!(h.escrows.get(&table, &b).unwrap().stack, 465);
	}

	#[test]
	fn s6_replayed_settlement_is_byte_identical_and_writes_nothing_new() {
		let mut h = Harness::new();
		let a = PlayerId::new("a");
		h.balances.initialize(a.clone(), 1000, 0).unwrap();
		let table = TableId::new("t1");
		let hand = HandId::new("h1");
		h.escrows.buy_in(&mut h.balances, &table, &a, 500, 0).unwrap();
		h.pots.open_hand(crate::ids::PotId::new("p1"), table.clone(), hand.clone());

		let request = || SettlementRequest {
			hand_id: hand.clone(),
			table_id: table.clone(),
			player_states: vec![PlayerHandState {
				player: a.clone(),
				total_bet: 100,
				is_all_in: false,
				is_folded: false,
			}],
			winner_rankings: {
				let mut m = BTreeMap::new();
				m.insert(a.clone(), 0);
				m
			},
			final_street: Street::River,
			flop_seen: true,
			is_uncontested: false,
		};

		let config = zero_rake_config();
		let clock = FixedClock(0);

		let first = {
			let mut ctx = EconomyContext {
				balances: &mut h.balances,
				escrows: &mut h.escrows,
				ledger: &mut h.ledger,
			};
			SettlementEngine::settle_hand(
				request(),
				&config,
				&[],
				&mut h.pots,
				&mut ctx,
				&mut h.coordinator,
				&clock,
			)
			.unwrap()
		};
		assert!(!first.replayed);
		let entries_after_first = h.ledger.len();

		let second = {
			let mut ctx = EconomyContext {
				balances: &mut h.balances,
				escrows: &mut h.escrows,
				ledger: &mut h.ledger,
			};
			SettlementEngine::settle_hand(
				request(),
				&config,
				&[],
				&mut h.pots,
				&mut ctx,
				&mut h.coordinator,
				&clock,
			)
			.unwrap()
		};
		assert!(second.replayed);
		assert_eq!(first.payouts, second.payouts);
		assert_eq!(first.total_pot, second.total_pot);
		assert_eq!(first.rake_collected, second.rake_collected);
		assert_eq!(h.ledger.len(), entries_after_first);
	}
}
