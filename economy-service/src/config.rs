//! Binary configuration, parsed with `clap::Parser` the way the teacher's
//! worker configuration does it (see `src/_teacher_worker_ref/config.rs`).

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "economy-service", about = "Table Authority service for a multi-club card room")]
pub struct EconomyServiceConfig {
	/// Directory snapshots are written to and recovered from.
	#[arg(long, default_value = "./snapshots")]
	pub snapshot_dir: PathBuf,

	/// Interval, in seconds, between automatic snapshots.
	#[arg(long, default_value_t = 300)]
	pub snapshot_interval_secs: u64,

	/// Number of most-recent snapshots retained.
	#[arg(long, default_value_t = 10)]
	pub snapshot_retention: usize,

	/// Default timeout, in seconds, for a pending transaction.
	#[arg(long, default_value_t = 30)]
	pub transaction_timeout_secs: u64,

	/// Maximum age, in seconds, a committed transaction is kept in the
	/// coordinator's log before `purge_old` drops it.
	#[arg(long, default_value_t = 3600)]
	pub transaction_log_max_age_secs: u64,

	/// Path to the default rake policy JSON file.
	#[arg(long, default_value = "./rake_policy.json")]
	pub rake_policy_path: PathBuf,

	/// Recompute and verify the snapshot checksum on recovery, rejecting a
	/// mismatch rather than silently loading tampered state.
	#[arg(long, default_value_t = true)]
	pub verify_on_recovery: bool,

	/// Log verbosity, passed straight to the tracing-subscriber filter.
	#[arg(long, default_value = "info")]
	pub log_level: String,
}

impl Default for EconomyServiceConfig {
	fn default() -> Self {
		Self {
			snapshot_dir: PathBuf::from("./snapshots"),
			snapshot_interval_secs: 300,
			snapshot_retention: 10,
			transaction_timeout_secs: 30,
			transaction_log_max_age_secs: 3600,
			rake_policy_path: PathBuf::from("./rake_policy.json"),
			verify_on_recovery: true,
			log_level: "info".into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;

	#[test]
	fn parses_with_defaults_from_bare_invocation() {
		let config = EconomyServiceConfig::parse_from(["economy-service"]);
		assert_eq!(config.snapshot_retention, 10);
		assert_eq!(config.transaction_timeout_secs, 30);
		assert!(config.verify_on_recovery);
	}

	#[test]
	fn overrides_take_precedence() {
		let config = EconomyServiceConfig::parse_from(["economy-service", "--snapshot-retention", "3", "--log-level", "debug"]);
		assert_eq!(config.snapshot_retention, 3);
		assert_eq!(config.log_level, "debug");
	}
}
