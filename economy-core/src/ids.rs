//! Branded identifier wrappers.
//!
//! Every entity that crosses a component boundary is addressed by one of
//! these newtypes rather than a bare `String`, so a `PlayerId` can never be
//! passed where a `TableId` is expected even though both are strings
//! underneath.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! branded_id {
	($name:ident, $prefix:literal) => {
		#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		pub struct $name(String);

		impl $name {
			pub fn new(raw: impl Into<String>) -> Self {
				Self(raw.into())
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}

			/// Prefix used when generating fresh identifiers of this kind.
			pub const PREFIX: &'static str = $prefix;
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<String> for $name {
			fn from(raw: String) -> Self {
				Self(raw)
			}
		}

		impl From<&str> for $name {
			fn from(raw: &str) -> Self {
				Self(raw.to_string())
			}
		}
	};
}

branded_id!(PlayerId, "ply_");
branded_id!(ClubId, "club_");
branded_id!(TableId, "tbl_");
branded_id!(HandId, "hand_");
branded_id!(EntryId, "entry_");
branded_id!(SettlementId, "stl_");
branded_id!(TransactionId, "txn_");
branded_id!(SnapshotId, "snap_");
branded_id!(PotId, "pot_");

/// A table and a hand, combined into the fixed settlement idempotency key
/// `tableId ⨁ handId` described in spec §3/§4.8.
pub fn settlement_idempotency_key(table: &TableId, hand: &HandId) -> String {
	format!("{}::{}", table.as_str(), hand.as_str())
}
