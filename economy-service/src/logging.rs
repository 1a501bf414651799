//! Logging initialization: a `tracing-subscriber` fmt layer as the sink,
//! with `tracing-log`'s `LogTracer` bridging the `log::info!(target: ...)`
//! calls used throughout `economy-core` (see `ledger.rs`, `settlement.rs`)
//! into the same subscriber.

use tracing_subscriber::EnvFilter;

pub fn init_logging(log_level: &str) {
	let _ = tracing_log::LogTracer::init();
	let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
