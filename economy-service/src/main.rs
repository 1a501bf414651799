use clap::Parser;
use economy_core::SystemClock;
use economy_service::{load_rake_config, logging::init_logging, ClubConfig, EconomyServiceConfig, TableAuthority};

fn main() {
	let config = EconomyServiceConfig::parse();
	init_logging(&config.log_level);

	let rake_config = match load_rake_config(&config.rake_policy_path) {
		Ok(cfg) => cfg,
		Err(e) => {
			log::error!(target: "economy-service", "failed to load rake policy, falling back to a zero-rake default: {e}");
			default_rake_config()
		}
	};

	log::info!(target: "economy-service", "economy-service starting with snapshot_dir={:?} retention={}", config.snapshot_dir, config.snapshot_retention);

	let mut authority = TableAuthority::new(SystemClock, rake_config, true);

	let demo_club = economy_core::ClubId::new("demo_club");
	let demo_owner = economy_core::PlayerId::new("demo_owner");
	let created = authority.create_club(
		demo_club,
		demo_owner,
		"Demo Club".to_string(),
		ClubConfig {
			min_buy_in: 10,
			max_buy_in: 10_000,
		},
	);
	if !created.success {
		log::error!(target: "economy-service", "failed to bootstrap demo club: {:?}", created.error);
	}

	log::info!(target: "economy-service", "economy-service ready, {} authority events recorded at startup", authority.events.len());
}

fn default_rake_config() -> economy_core::RakeConfig {
	economy_core::RakeConfig {
		policy_id: "fallback_zero".into(),
		default_percentage: 0,
		default_cap: 0,
		no_flop_no_rake: false,
		exclude_uncontested: false,
		min_pot_for_rake: 0,
		street_overrides: std::collections::BTreeMap::new(),
		waiver: None,
	}
}
