//! Rake Evaluator (component 6): a pure strategy-selected calculation over a
//! frozen `RakeConfig`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{clock::Clock, pot::Street};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RakeTier {
	pub min_pot: u64,
	/// Exclusive upper bound; `None` means unbounded.
	pub max_pot: Option<u64>,
	pub percentage: u32,
	pub cap: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreetOverride {
	pub percentage: u32,
	pub cap: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RakeWaiver {
	pub enabled: bool,
	/// Unix ms; `None` means the waiver never expires.
	pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RakeConfig {
	pub policy_id: String,
	pub default_percentage: u32,
	pub default_cap: u64,
	pub no_flop_no_rake: bool,
	pub exclude_uncontested: bool,
	pub min_pot_for_rake: u64,
	pub street_overrides: BTreeMap<Street, StreetOverride>,
	pub waiver: Option<RakeWaiver>,
}

impl RakeConfig {
	/// Deterministic hash of the config's fields, used as the
	/// `{policyId, policyHash}` pair frozen on a table when a hand opens.
	pub fn policy_hash(&self) -> String {
		// Canonical serialization: serde_json over a BTreeMap-backed struct
		// produces sorted keys, and Vec/BTreeMap ordering is already
		// deterministic, so a straight `to_vec` is a stable canonical form.
		let bytes = serde_json::to_vec(self).expect("RakeConfig always serializes");
		blake3::hash(&bytes).to_hex().to_string()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RakeStrategy {
	Standard,
	StreetBased,
	Zero,
	Tiered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RakeEvaluation {
	pub rake_amount: u64,
	pub pot_after_rake: u64,
	/// Derived display value only (`rake * 100 / pot`); never feed this back
	/// into downstream math.
	pub percentage_applied: f64,
	pub cap_applied: bool,
	pub waived: bool,
	pub waived_reason: Option<String>,
	pub policy_name: String,
	pub config_hash: String,
}

pub struct RakeEvaluator;

impl RakeEvaluator {
	/// `tiers` is consulted only when the Tiered strategy is selected
	/// (non-zero default percentage, no matching street override, and a
	/// tier table supplied by the caller).
	pub fn evaluate(
		config: &RakeConfig,
		tiers: &[RakeTier],
		pot_size: u64,
		final_street: Street,
		flop_seen: bool,
		is_uncontested: bool,
		clock: &dyn Clock,
	) -> RakeEvaluation {
		let policy_name = config.policy_id.clone();
		let config_hash = config.policy_hash();

		let waived = |reason: &str| RakeEvaluation {
			rake_amount: 0,
			pot_after_rake: pot_size,
			percentage_applied: 0.0,
			cap_applied: false,
			waived: true,
			waived_reason: Some(reason.to_string()),
			policy_name: policy_name.clone(),
			config_hash: config_hash.clone(),
		};

		if pot_size < config.min_pot_for_rake {
			return waived("below minimum");
		}
		if config.no_flop_no_rake && !flop_seen {
			return waived("No flop seen");
		}
		if config.exclude_uncontested && is_uncontested {
			return waived("uncontested pot");
		}
		if let Some(w) = &config.waiver {
			if w.enabled && w.expires_at.map(|exp| clock.now_ms() < exp).unwrap_or(true) {
				return waived("active waiver");
			}
		}

		let strategy = select_strategy_with_tiers(config, tiers, final_street, pot_size);
		let (percentage, cap) = match strategy {
			RakeStrategy::Zero => {
				return waived("zero-percent policy");
			}
			RakeStrategy::Standard => (config.default_percentage, config.default_cap),
			RakeStrategy::StreetBased => {
				let over = &config.street_overrides[&final_street];
				(over.percentage, over.cap)
			}
			RakeStrategy::Tiered => {
				let tier = tiers
					.iter()
					.find(|t| pot_size >= t.min_pot && t.max_pot.map(|m| pot_size < m).unwrap_or(true));
				match tier {
					Some(t) => (t.percentage, t.cap),
					None => (config.default_percentage, config.default_cap),
				}
			}
		};

		let mut rake = pot_size * percentage as u64 / 100;
		let mut cap_applied = false;
		if cap > 0 && rake > cap {
			rake = cap;
			cap_applied = true;
		}

		let percentage_applied = if pot_size > 0 {
			rake as f64 * 100.0 / pot_size as f64
		} else {
			0.0
		};

		RakeEvaluation {
			rake_amount: rake,
			pot_after_rake: pot_size - rake,
			percentage_applied,
			cap_applied,
			waived: false,
			waived_reason: None,
			policy_name,
			config_hash,
		}
	}
}

fn select_strategy_with_tiers(
	config: &RakeConfig,
	tiers: &[RakeTier],
	final_street: Street,
	_pot_size: u64,
) -> RakeStrategy {
	if config.default_percentage == 0 {
		return RakeStrategy::Zero;
	}
	if config.street_overrides.contains_key(&final_street) {
		return RakeStrategy::StreetBased;
	}
	if !tiers.is_empty() {
		return RakeStrategy::Tiered;
	}
	RakeStrategy::Standard
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::FixedClock;

	fn base_config() -> RakeConfig {
		RakeConfig {
			policy_id: "default".into(),
			default_percentage: 5,
			default_cap: 0,
			no_flop_no_rake: true,
			exclude_uncontested: false,
			min_pot_for_rake: 0,
			street_overrides: BTreeMap::new(),
			waiver: None,
		}
	}

	#[test]
	fn s4_rake_cap_applies() {
		let mut config = base_config();
		config.default_percentage = 10;
		config.default_cap = 5;
		config.no_flop_no_rake = false;
		let eval = RakeEvaluator::evaluate(&config, &[], 400, Street::River, true, false, &FixedClock(0));
		assert_eq!(eval.rake_amount, 5);
		assert!(eval.cap_applied);
		assert_eq!(eval.pot_after_rake, 395);
	}

	#[test]
	fn s5_no_flop_no_rake_waiver() {
		let config = base_config();
		let eval = RakeEvaluator::evaluate(&config, &[], 200, Street::PreFlop, false, false, &FixedClock(0));
		assert!(eval.waived);
		assert_eq!(eval.waived_reason.as_deref(), Some("No flop seen"));
		assert_eq!(eval.rake_amount, 0);
		assert_eq!(eval.pot_after_rake, 200);
	}

	#[test]
	fn zero_percentage_is_waived_not_computed() {
		let mut config = base_config();
		config.default_percentage = 0;
		config.no_flop_no_rake = false;
		let eval = RakeEvaluator::evaluate(&config, &[], 1000, Street::River, true, false, &FixedClock(0));
		assert!(eval.waived);
	}

	#[test]
	fn below_minimum_pot_is_waived() {
		let mut config = base_config();
		config.no_flop_no_rake = false;
		config.min_pot_for_rake = 50;
		let eval = RakeEvaluator::evaluate(&config, &[], 10, Street::River, true, false, &FixedClock(0));
		assert!(eval.waived);
		assert_eq!(eval.waived_reason.as_deref(), Some("below minimum"));
	}

	#[test]
	fn policy_hash_is_deterministic() {
		let config = base_config();
		assert_eq!(config.policy_hash(), config.policy_hash());
	}
}
