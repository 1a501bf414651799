//! End-to-end scenarios exercising the public `economy-core` API the way
//! `economy-service`'s Table Authority would: buy-in, bet, settle.

use std::collections::BTreeMap;

use economy_core::{
	BalanceKeeper, Clock, EconomyContext, EscrowKeeper, FixedClock, HandId, Ledger, PlayerHandState, PlayerId,
	PotBuilder, PotId, RakeConfig, SettlementEngine, SettlementRequest, Street, TableId, TransactionCoordinator,
};

struct World {
	balances: BalanceKeeper,
	escrows: EscrowKeeper,
	pots: PotBuilder,
	ledger: Ledger,
	coordinator: TransactionCoordinator,
}

impl World {
	fn new() -> Self {
		Self {
			balances: BalanceKeeper::new(),
			escrows: EscrowKeeper::new(),
			pots: PotBuilder::new(),
			ledger: Ledger::new(),
			coordinator: TransactionCoordinator::new(true),
		}
	}

	fn seat(&mut self, player: &PlayerId, table: &TableId, stake: u64, buy_in: u64) {
		self.balances.initialize(player.clone(), stake, 0).unwrap();
		self.escrows.buy_in(&mut self.balances, table, player, buy_in, 0).unwrap();
	}

	/// Moves `amount` from a seated player's escrow into the hand's pot, as
	/// the Transaction Coordinator would during betting.
	fn contribute(&mut self, table: &TableId, player: &PlayerId, amount: u64) {
		self.escrows.commit_chips(table, player, amount, 0).unwrap();
		self.escrows.move_to_pot(&mut self.balances, table, player, amount, 0).unwrap();
	}

}

fn zero_rake() -> RakeConfig {
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

#[test]
fn s2_three_way_all_in_settles_through_the_public_api() {
	let mut world = World::new();
	let table = TableId::new("t1");
	let hand = HandId::new("h1");
	let a = PlayerId::new("a");
	let b = PlayerId::new("b");
	let c = PlayerId::new("c");

	world.seat(&a, &table, 100, 100);
	world.seat(&b, &table, 200, 200);
	world.seat(&c, &table, 300, 300);
	world.contribute(&table, &a, 100);
	world.contribute(&table, &b, 200);
	world.contribute(&table, &c, 300);

	world.pots.open_hand(PotId::new("p1"), table.clone(), hand.clone());

	let mut rankings = BTreeMap::new();
	rankings.insert(a.clone(), 0);
	rankings.insert(b.clone(), 1);
	rankings.insert(c.clone(), 2);

	let request = SettlementRequest {
		hand_id: hand.clone(),
		table_id: table.clone(),
		player_states: vec![
			PlayerHandState {
				player: a.clone(),
				total_bet: 100,
				is_all_in: true,
				is_folded: false,
			},
			PlayerHandState {
				player: b.clone(),
				total_bet: 200,
				is_all_in: true,
				is_folded: false,
			},
			PlayerHandState {
				player: c.clone(),
				total_bet: 300,
				is_all_in: false,
				is_folded: false,
			},
		],
		winner_rankings: rankings,
		final_street: Street::River,
		flop_seen: true,
		is_uncontested: false,
	};

	let config = zero_rake();
	let clock = FixedClock(1_000);
	let mut ctx = EconomyContext {
		balances: &mut world.balances,
		escrows: &mut world.escrows,
		ledger: &mut world.ledger,
	};
	let outcome = SettlementEngine::settle_hand(request, &config, &[], &mut world.pots, &mut ctx, &mut world.coordinator, &clock).unwrap();

	assert_eq!(outcome.total_pot, 600);
	assert_eq!(outcome.rake_collected, 0);
	assert_eq!(outcome.payouts[&a], 300);
	assert_eq!(outcome.payouts[&b], 200);
	assert_eq!(outcome.payouts[&c], 100);

	assert_eq!(world.escrows.get(&table, &a).unwrap().stack, 300);
	assert_eq!(world.escrows.get(&table, &b).unwrap().stack, 200);
	assert_eq!(world.escrows.get(&table, &c).unwrap().stack, 100);

	assert!(world.ledger.verify_hand_conservation(&hand));
	let (valid, broken_at) = world.ledger.verify_integrity();
	assert!(valid);
	assert!(broken_at.is_none());
}

#[test]
fn s3_odd_chip_remainder_settles_through_the_public_api() {
	let mut world = World::new();
	let table = TableId::new("t1");
	let hand = HandId::new("h1");
	let winner_51 = PlayerId::new("winner_51");
	let winner_50 = PlayerId::new("winner_50");

	world.seat(&winner_51, &table, 51, 51);
	world.seat(&winner_50, &table, 50, 50);
	world.contribute(&table, &winner_51, 51);
	world.contribute(&table, &winner_50, 50);
	world.pots.open_hand(PotId::new("p1"), table.clone(), hand.clone());

	let mut rankings = BTreeMap::new();
	rankings.insert(winner_51.clone(), 0);
	rankings.insert(winner_50.clone(), 0);

	let request = SettlementRequest {
		hand_id: hand.clone(),
		table_id: table.clone(),
		player_states: vec![
			PlayerHandState {
				player: winner_51.clone(),
				total_bet: 51,
				is_all_in: false,
				is_folded: false,
			},
			PlayerHandState {
				player: winner_50.clone(),
				total_bet: 50,
				is_all_in: false,
				is_folded: false,
			},
		],
		winner_rankings: rankings,
		final_street: Street::River,
		flop_seen: true,
		is_uncontested: false,
	};

	let config = zero_rake();
	let clock = FixedClock(0);
	let mut ctx = EconomyContext {
		balances: &mut world.balances,
		escrows: &mut world.escrows,
		ledger: &mut world.ledger,
	};
	let outcome = SettlementEngine::settle_hand(request, &config, &[], &mut world.pots, &mut ctx, &mut world.coordinator, &clock).unwrap();

	assert_eq!(outcome.payouts[&winner_50], 51);
	assert_eq!(outcome.payouts[&winner_51], 50);
	assert_eq!(outcome.payouts.values().sum::<u64>(), 101);
}

#[test]
fn settlement_is_idempotent_across_repeated_calls() {
	let mut world = World::new();
	let table = TableId::new("t1");
	let hand = HandId::new("h1");
	let a = PlayerId::new("a");
	world.seat(&a, &table, 1000, 500);
	world.contribute(&table, &a, 100);
	world.pots.open_hand(PotId::new("p1"), table.clone(), hand.clone());

	let build_request = || SettlementRequest {
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

	let config = zero_rake();
	let clock = FixedClock(0);

	let first = {
		let mut ctx = EconomyContext {
			balances: &mut world.balances,
			escrows: &mut world.escrows,
			ledger: &mut world.ledger,
		};
		SettlementEngine::settle_hand(build_request(), &config, &[], &mut world.pots, &mut ctx, &mut world.coordinator, &clock).unwrap()
	};
	let ledger_len_after_first = world.ledger.len();

	for _ in 0..3 {
		let mut ctx = EconomyContext {
			balances: &mut world.balances,
			escrows: &mut world.escrows,
			ledger: &mut world.ledger,
		};
		let replay = SettlementEngine::settle_hand(build_request(), &config, &[], &mut world.pots, &mut ctx, &mut world.coordinator, &clock).unwrap();
		assert!(replay.replayed);
		assert_eq!(replay.payouts, first.payouts);
	}
	assert_eq!(world.ledger.len(), ledger_len_after_first);
	let _ = clock.now_ms();
}
