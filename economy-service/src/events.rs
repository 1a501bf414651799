//! Authority event stream: an append-only log of exactly one event per
//! mutation, mirroring the action set plus the denial/lifecycle/settlement
//! extras spec §6 lists.

use economy_core::{ClubId, PlayerId, TableId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authz::AuthorizationDenialReason;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorityEventType {
	ClubCreated,
	ClubConfigUpdated,
	ClubRakePolicyUpdated,
	ClubDeleted,
	MemberInvited,
	MemberJoined,
	MemberLeft,
	MemberBanned,
	MemberUnbanned,
	MemberPromoted,
	MemberDemoted,
	OwnershipTransferred,
	TableCreated,
	TableClosed,
	TablePaused,
	TableResumed,
	PlayerJoinedTable,
	PlayerLeftTable,
	PlayerKickedTable,
	PlayerBoughtInTable,
	PlayerCashedOutTable,
	PlayerReboughtTable,
	PlayerToppedUpTable,
	HandStarted,
	ForceActionApplied,
	SettlementStarted,
	SettlementCompleted,
	RecoveryStarted,
	RecoveryCompleted,
	InvariantViolation,
	AuthorizationDenied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityEvent {
	pub event_id: String,
	pub event_type: AuthorityEventType,
	pub club_id: ClubId,
	pub table_id: Option<TableId>,
	pub actor_id: PlayerId,
	pub target_id: Option<PlayerId>,
	pub data: Value,
	pub timestamp: i64,
}

#[derive(Debug, Default)]
pub struct AuthorityEventLog {
	events: Vec<AuthorityEvent>,
	next_seq: u64,
}

impl AuthorityEventLog {
	pub fn new() -> Self {
		Self::default()
	}

	fn next_event_id(&mut self) -> String {
		let id = format!("evt_{}", self.next_seq);
		self.next_seq += 1;
		id
	}

	pub fn record(
		&mut self,
		event_type: AuthorityEventType,
		club_id: ClubId,
		table_id: Option<TableId>,
		actor_id: PlayerId,
		target_id: Option<PlayerId>,
		data: Value,
		now_ms: i64,
	) -> &AuthorityEvent {
		let event_id = self.next_event_id();
		self.events.push(AuthorityEvent {
			event_id,
			event_type,
			club_id,
			table_id,
			actor_id,
			target_id,
			data,
			timestamp: now_ms,
		});
		self.events.last().expect("just pushed")
	}

	pub fn record_denial(
		&mut self,
		club_id: ClubId,
		table_id: Option<TableId>,
		actor_id: PlayerId,
		reason: AuthorizationDenialReason,
		now_ms: i64,
	) -> &AuthorityEvent {
		self.record(
			AuthorityEventType::AuthorizationDenied,
			club_id,
			table_id,
			actor_id,
			None,
			serde_json::json!({ "reason": format!("{reason:?}") }),
			now_ms,
		)
	}

	pub fn events(&self) -> &[AuthorityEvent] {
		&self.events
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn each_call_appends_exactly_one_event() {
		let mut log = AuthorityEventLog::new();
		log.record(
			AuthorityEventType::TableCreated,
			ClubId::new("club1"),
			Some(TableId::new("t1")),
			PlayerId::new("owner"),
			None,
			serde_json::json!({}),
			1,
		);
		assert_eq!(log.len(), 1);
		log.record_denial(ClubId::new("club1"), None, PlayerId::new("p1"), AuthorizationDenialReason::MemberBanned, 2);
		assert_eq!(log.len(), 2);
		assert_eq!(log.events()[1].event_type, AuthorityEventType::AuthorizationDenied);
	}
}
