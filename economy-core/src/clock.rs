//! An explicit time capability.
//!
//! The rake evaluator and ledger both need "now" in milliseconds, but
//! reaching for a wall-clock singleton would make settlement
//! non-deterministic under replay. Every evaluator that reads time takes a
//! `&dyn Clock` instead.

pub trait Clock: Send + Sync {
	fn now_ms(&self) -> i64;
}

/// Real wall-clock time, for production wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_ms(&self) -> i64 {
		use std::time::{SystemTime, UNIX_EPOCH};
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.expect("system clock before epoch")
			.as_millis() as i64
	}
}

/// A fixed instant, for deterministic tests and replay.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
	fn now_ms(&self) -> i64 {
		self.0
	}
}
