//! Table Authority: the single externally facing surface that mutates
//! balances, escrows, pots or the ledger. Every call builds an
//! `AuthorizationContext`, runs the Authorization Engine, and only on
//! allow touches any state; on deny it emits `authorization_denied` and
//! leaves everything untouched (spec §4.10/§6).

use std::collections::{BTreeMap, HashSet};

use economy_core::{
	BalanceKeeper, Clock, EconomyContext, EconomyError, EscrowKeeper, HandId, Ledger, PlayerId,
	PotBuilder, PotId, RakeConfig, TableId, TransactionCoordinator,
};
use serde_json::json;

use crate::authz::{authorize, Action, AuthorizationContext, AuthorizationDenialReason, TableSnapshot, TableStatus};
use crate::club_registry::{ClubConfig, ClubRegistry, ClubRegistryError, Role};
use crate::events::{AuthorityEvent, AuthorityEventLog, AuthorityEventType};

#[derive(Debug, Clone)]
pub struct AuthorizationOutcome {
	pub allowed: bool,
	pub denial_reason: Option<AuthorizationDenialReason>,
	pub request_id: String,
	pub caller_id: PlayerId,
	pub action: Action,
	pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct AuthorityResult<T> {
	pub success: bool,
	pub data: Option<T>,
	pub authorization: AuthorizationOutcome,
	pub error: Option<String>,
}

impl<T> AuthorityResult<T> {
	fn denied(outcome: AuthorizationOutcome) -> Self {
		Self {
			success: false,
			data: None,
			authorization: outcome,
			error: None,
		}
	}

	fn allowed(outcome: AuthorizationOutcome, data: T) -> Self {
		Self {
			success: true,
			data: Some(data),
			authorization: outcome,
			error: None,
		}
	}

	fn failed(outcome: AuthorizationOutcome, error: EconomyError) -> Self {
		Self {
			success: false,
			data: None,
			authorization: outcome,
			error: Some(error.to_string()),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLifecycle {
	Open,
	Active,
	Paused,
	Closed,
}

impl TableLifecycle {
	fn to_snapshot_status(self) -> TableStatus {
		match self {
			TableLifecycle::Open => TableStatus::Open,
			TableLifecycle::Active => TableStatus::Active,
			TableLifecycle::Paused => TableStatus::Paused,
			TableLifecycle::Closed => TableStatus::Closed,
		}
	}
}

#[derive(Debug, Clone)]
pub struct RakePolicySnapshot {
	pub policy_id: String,
	pub policy_hash: String,
}

#[derive(Debug, Clone)]
pub struct Table {
	pub table_id: TableId,
	pub club_id: economy_core::ClubId,
	pub status: TableLifecycle,
	pub current_hand_id: Option<HandId>,
	pub seats: HashSet<PlayerId>,
	pub max_seats: u32,
	pub rake_policy_snapshot: Option<RakePolicySnapshot>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
	#[error(transparent)]
	ClubRegistry(#[from] ClubRegistryError),
	#[error(transparent)]
	Economy(#[from] EconomyError),
	#[error("table {0} not found")]
	TableNotFound(TableId),
	#[error("invalid state transition for table {0}")]
	InvalidTransition(TableId),
}

/// Owns every component of the economy core plus the club registry, table
/// map and event log. Runs synchronously; `economy-service`'s binary wraps
/// one instance in a single-writer actor per spec §5.
pub struct TableAuthority<C: Clock> {
	pub balances: BalanceKeeper,
	pub escrows: EscrowKeeper,
	pub pots: PotBuilder,
	pub ledger: Ledger,
	pub coordinator: TransactionCoordinator,
	pub clubs: ClubRegistry,
	pub tables: BTreeMap<TableId, Table>,
	pub events: AuthorityEventLog,
	pub rake_config: RakeConfig,
	clock: C,
	next_request_seq: u64,
}

impl<C: Clock> TableAuthority<C> {
	pub fn new(clock: C, rake_config: RakeConfig, idempotency_enabled: bool) -> Self {
		Self {
			balances: BalanceKeeper::new(),
			escrows: EscrowKeeper::new(),
			pots: PotBuilder::new(),
			ledger: Ledger::new(),
			coordinator: TransactionCoordinator::new(idempotency_enabled),
			clubs: ClubRegistry::new(),
			tables: BTreeMap::new(),
			events: AuthorityEventLog::new(),
			rake_config,
			clock,
			next_request_seq: 0,
		}
	}

	fn now(&self) -> i64 {
		self.clock.now_ms()
	}

	fn next_request_id(&mut self) -> String {
		let id = format!("req_{}", self.next_request_seq);
		self.next_request_seq += 1;
		id
	}

	fn table_snapshot(&self, table_id: &TableId) -> Option<TableSnapshot> {
		self.tables.get(table_id).map(|t| TableSnapshot {
			status: t.status.to_snapshot_status(),
			hand_in_progress: t.current_hand_id.is_some(),
			occupied_seats: t.seats.len() as u32,
			max_seats: t.max_seats,
		})
	}

	/// Runs the Authorization Engine for one call and, on deny, emits the
	/// `authorization_denied` event. Returns the decision alongside a
	/// ready-made `AuthorizationOutcome` for the caller's result envelope.
	fn decide(
		&mut self,
		action: Action,
		club_id: &economy_core::ClubId,
		caller: &PlayerId,
		target: Option<&PlayerId>,
		table_id: Option<&TableId>,
		is_self_action: bool,
		buy_in_amount: Option<u64>,
		player_already_at_table: bool,
	) -> AuthorizationOutcome {
		let now = self.now();
		let request_id = self.next_request_id();

		let caller_role = self.clubs.role_of(club_id, caller);
		let caller_banned = self.clubs.is_banned(club_id, caller);
		let caller_left = self.clubs.has_left(club_id, caller);
		let club_active = self
			.clubs
			.club(club_id)
			.map(|c| c.status == crate::club_registry::ClubStatus::Active)
			.unwrap_or(action == Action::CreateClub);
		let target_role = target.and_then(|t| self.clubs.role_of(club_id, t));
		let table = table_id.and_then(|t| self.table_snapshot(t));
		let (min_buy_in, max_buy_in, caller_available) = {
			let min_max = self.clubs.club(club_id).map(|c| (c.config.min_buy_in, c.config.max_buy_in));
			let available = self.balances.get(caller).map(|b| b.available);
			(min_max.map(|m| m.0), min_max.map(|m| m.1), available)
		};
		let rake_policy_locked = table_id
			.and_then(|t| self.tables.get(t))
			.map(|t| t.rake_policy_snapshot.is_some())
			.unwrap_or(false);

		let ac = AuthorizationContext {
			action,
			caller_role,
			caller_banned,
			caller_left,
			club_active,
			target_role,
			is_self_action,
			table,
			buy_in_amount,
			caller_available_balance: caller_available,
			min_buy_in,
			max_buy_in,
			rebuy_allowed: true,
			top_up_allowed: true,
			rake_policy_locked,
			player_already_at_table,
		};

		let decision = authorize(&ac);
		let denial_reason = decision.err();
		if let Some(reason) = denial_reason {
			self.events.record_denial(club_id.clone(), table_id.cloned(), caller.clone(), reason, now);
		}

		AuthorizationOutcome {
			allowed: denial_reason.is_none(),
			denial_reason,
			request_id,
			caller_id: caller.clone(),
			action,
			timestamp: now,
		}
	}

	// ---- Club lifecycle -------------------------------------------------

	pub fn create_club(
		&mut self,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		name: String,
		config: ClubConfig,
	) -> AuthorityResult<()> {
		let outcome = self.decide(Action::CreateClub, &club_id, &caller, None, None, true, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		match self.clubs.create_club(club_id.clone(), name, caller.clone(), config) {
			Ok(()) => {
				let now = self.now();
				self.events.record(AuthorityEventType::ClubCreated, club_id, None, caller, None, json!({}), now);
				AuthorityResult::allowed(outcome, ())
			}
			Err(e) => AuthorityResult::failed(outcome, EconomyError::InvalidConfig { reason: e.to_string() }),
		}
	}

	pub fn update_club_config(
		&mut self,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		config: ClubConfig,
	) -> AuthorityResult<()> {
		let outcome = self.decide(Action::UpdateClubConfig, &club_id, &caller, None, None, false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		if let Some(club) = self.clubs.club_mut(&club_id) {
			club.config = config;
		}
		let now = self.now();
		self.events
			.record(AuthorityEventType::ClubConfigUpdated, club_id, None, caller, None, json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn update_rake_policy(
		&mut self,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		table_id: TableId,
		new_config: RakeConfig,
	) -> AuthorityResult<()> {
		let outcome = self.decide(Action::UpdateRakePolicy, &club_id, &caller, None, Some(&table_id), false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		self.rake_config = new_config;
		let now = self.now();
		self.events
			.record(AuthorityEventType::ClubRakePolicyUpdated, club_id, Some(table_id), caller, None, json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn delete_club(&mut self, club_id: economy_core::ClubId, caller: PlayerId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::DeleteClub, &club_id, &caller, None, None, false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		if let Err(e) = self.clubs.delete_club(&club_id) {
			return AuthorityResult::failed(outcome, EconomyError::InvalidConfig { reason: e.to_string() });
		}
		let now = self.now();
		self.events.record(AuthorityEventType::ClubDeleted, club_id, None, caller, None, json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	// ---- Membership -------------------------------------------------------

	pub fn invite_member(&mut self, club_id: economy_core::ClubId, caller: PlayerId, target: PlayerId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::InviteMember, &club_id, &caller, Some(&target), None, false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		self.clubs.invite_member(&club_id, target.clone());
		let now = self.now();
		self.events
			.record(AuthorityEventType::MemberInvited, club_id, None, caller, Some(target), json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn accept_invitation(&mut self, club_id: economy_core::ClubId, caller: PlayerId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::AcceptInvitation, &club_id, &caller, None, None, true, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		let now = self.now();
		self.events
			.record(AuthorityEventType::MemberJoined, club_id, None, caller, None, json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn remove_member(&mut self, club_id: economy_core::ClubId, caller: PlayerId, target: PlayerId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::RemoveMember, &club_id, &caller, Some(&target), None, false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		self.clubs.remove_member(&club_id, &target);
		let now = self.now();
		self.events
			.record(AuthorityEventType::MemberLeft, club_id, None, caller, Some(target), json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn ban_member(&mut self, club_id: economy_core::ClubId, caller: PlayerId, target: PlayerId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::BanMember, &club_id, &caller, Some(&target), None, false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		self.clubs.ban_member(&club_id, &target);
		let now = self.now();
		self.events
			.record(AuthorityEventType::MemberBanned, club_id, None, caller, Some(target), json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn unban_member(&mut self, club_id: economy_core::ClubId, caller: PlayerId, target: PlayerId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::UnbanMember, &club_id, &caller, Some(&target), None, false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		self.clubs.unban_member(&club_id, &target);
		let now = self.now();
		self.events
			.record(AuthorityEventType::MemberUnbanned, club_id, None, caller, Some(target), json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn promote_to_manager(&mut self, club_id: economy_core::ClubId, caller: PlayerId, target: PlayerId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::PromoteToManager, &club_id, &caller, Some(&target), None, false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		self.clubs.set_role(&club_id, &target, Role::Manager);
		let now = self.now();
		self.events
			.record(AuthorityEventType::MemberPromoted, club_id, None, caller, Some(target), json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn demote_from_manager(&mut self, club_id: economy_core::ClubId, caller: PlayerId, target: PlayerId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::DemoteFromManager, &club_id, &caller, Some(&target), None, false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		self.clubs.set_role(&club_id, &target, Role::Player);
		let now = self.now();
		self.events
			.record(AuthorityEventType::MemberDemoted, club_id, None, caller, Some(target), json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn transfer_ownership(&mut self, club_id: economy_core::ClubId, caller: PlayerId, new_owner: PlayerId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::TransferOwnership, &club_id, &caller, Some(&new_owner), None, false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		if let Err(e) = self.clubs.transfer_ownership(&club_id, &new_owner) {
			return AuthorityResult::failed(outcome, EconomyError::InvalidConfig { reason: e.to_string() });
		}
		let now = self.now();
		self.events
			.record(AuthorityEventType::OwnershipTransferred, club_id, None, caller, Some(new_owner), json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	// ---- Table lifecycle ----------------------------------------------

	pub fn create_table(
		&mut self,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		table_id: TableId,
		max_seats: u32,
	) -> AuthorityResult<()> {
		let outcome = self.decide(Action::CreateTable, &club_id, &caller, None, None, false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		self.tables.insert(
			table_id.clone(),
			Table {
				table_id: table_id.clone(),
				club_id: club_id.clone(),
				status: TableLifecycle::Open,
				current_hand_id: None,
				seats: HashSet::new(),
				max_seats,
				rake_policy_snapshot: None,
			},
		);
		let now = self.now();
		self.events
			.record(AuthorityEventType::TableCreated, club_id, Some(table_id), caller, None, json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	fn set_table_status(&mut self, table_id: &TableId, status: TableLifecycle) -> Result<(), AuthorityError> {
		let table = self
			.tables
			.get_mut(table_id)
			.ok_or_else(|| AuthorityError::TableNotFound(table_id.clone()))?;
		table.status = status;
		Ok(())
	}

	pub fn close_table(&mut self, club_id: economy_core::ClubId, caller: PlayerId, table_id: TableId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::CloseTable, &club_id, &caller, None, Some(&table_id), false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		if let Err(e) = self.set_table_status(&table_id, TableLifecycle::Closed) {
			return AuthorityResult::failed(outcome, EconomyError::InvalidConfig { reason: e.to_string() });
		}
		let now = self.now();
		self.events
			.record(AuthorityEventType::TableClosed, club_id, Some(table_id), caller, None, json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn pause_table(&mut self, club_id: economy_core::ClubId, caller: PlayerId, table_id: TableId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::PauseTable, &club_id, &caller, None, Some(&table_id), false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		if let Err(e) = self.set_table_status(&table_id, TableLifecycle::Paused) {
			return AuthorityResult::failed(outcome, EconomyError::InvalidConfig { reason: e.to_string() });
		}
		let now = self.now();
		self.events
			.record(AuthorityEventType::TablePaused, club_id, Some(table_id), caller, None, json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn resume_table(&mut self, club_id: economy_core::ClubId, caller: PlayerId, table_id: TableId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::ResumeTable, &club_id, &caller, None, Some(&table_id), false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		let target_status = if self
			.tables
			.get(&table_id)
			.map(|t| t.current_hand_id.is_some())
			.unwrap_or(false)
		{
			TableLifecycle::Active
		} else {
			TableLifecycle::Open
		};
		if let Err(e) = self.set_table_status(&table_id, target_status) {
			return AuthorityResult::failed(outcome, EconomyError::InvalidConfig { reason: e.to_string() });
		}
		let now = self.now();
		self.events
			.record(AuthorityEventType::TableResumed, club_id, Some(table_id), caller, None, json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	// ---- Seating & chips ------------------------------------------------

	pub fn join_table(&mut self, club_id: economy_core::ClubId, caller: PlayerId, table_id: TableId) -> AuthorityResult<()> {
		let already_seated = self.tables.get(&table_id).map(|t| t.seats.contains(&caller)).unwrap_or(false);
		let outcome = self.decide(Action::JoinTable, &club_id, &caller, None, Some(&table_id), true, None, already_seated);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		if let Some(table) = self.tables.get_mut(&table_id) {
			table.seats.insert(caller.clone());
		}
		let now = self.now();
		self.events
			.record(AuthorityEventType::PlayerJoinedTable, club_id, Some(table_id), caller, None, json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn leave_table(&mut self, club_id: economy_core::ClubId, caller: PlayerId, table_id: TableId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::LeaveTable, &club_id, &caller, None, Some(&table_id), true, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		if let Some(table) = self.tables.get_mut(&table_id) {
			table.seats.remove(&caller);
		}
		let now = self.now();
		self.events
			.record(AuthorityEventType::PlayerLeftTable, club_id, Some(table_id), caller, None, json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn kick_player(&mut self, club_id: economy_core::ClubId, caller: PlayerId, table_id: TableId, target: PlayerId) -> AuthorityResult<()> {
		let outcome = self.decide(Action::KickPlayer, &club_id, &caller, Some(&target), Some(&table_id), false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		if let Some(table) = self.tables.get_mut(&table_id) {
			table.seats.remove(&target);
		}
		let now = self.now();
		self.events
			.record(AuthorityEventType::PlayerKickedTable, club_id, Some(table_id), caller, Some(target), json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn buy_in(
		&mut self,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		table_id: TableId,
		amount: u64,
	) -> AuthorityResult<()> {
		let already_seated = self.tables.get(&table_id).map(|t| t.seats.contains(&caller)).unwrap_or(false);
		let outcome = self.decide(
			Action::BuyIn,
			&club_id,
			&caller,
			None,
			Some(&table_id),
			true,
			Some(amount),
			already_seated,
		);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		let now = self.now();
		if let Err(e) = self.escrows.buy_in(&mut self.balances, &table_id, &caller, amount, now) {
			return AuthorityResult::failed(outcome, e);
		}
		let balance_after = self.balances.get(&caller).map(|b| b.available).unwrap_or(0);
		if let Err(e) = self.ledger.record_buy_in(caller.clone(), table_id.clone(), amount, balance_after, now) {
			return AuthorityResult::failed(outcome, e);
		}
		self.events.record(
			AuthorityEventType::PlayerBoughtInTable,
			club_id,
			Some(table_id),
			caller,
			None,
			json!({ "amount": amount }),
			now,
		);
		AuthorityResult::allowed(outcome, ())
	}

	fn cash_out_like(
		&mut self,
		action: Action,
		event_type: AuthorityEventType,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		table_id: TableId,
		amount: Option<u64>,
	) -> AuthorityResult<u64> {
		let already_seated = self.tables.get(&table_id).map(|t| t.seats.contains(&caller)).unwrap_or(false);
		let outcome = self.decide(action, &club_id, &caller, None, Some(&table_id), true, None, already_seated);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		let now = self.now();
		let cashed = match self.escrows.cash_out(&mut self.balances, &table_id, &caller, amount, now) {
			Ok(cashed) => cashed,
			Err(e) => return AuthorityResult::failed(outcome, e),
		};
		let balance_after = self.balances.get(&caller).map(|b| b.available).unwrap_or(0);
		if let Err(e) = self.ledger.record_cash_out(caller.clone(), table_id.clone(), cashed, balance_after, now) {
			return AuthorityResult::failed(outcome, e);
		}
		self.events.record(
			event_type,
			club_id,
			Some(table_id),
			caller,
			None,
			json!({ "amount": cashed }),
			now,
		);
		AuthorityResult::allowed(outcome, cashed)
	}

	pub fn cash_out(
		&mut self,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		table_id: TableId,
		amount: Option<u64>,
	) -> AuthorityResult<u64> {
		self.cash_out_like(Action::CashOut, AuthorityEventType::PlayerCashedOutTable, club_id, caller, table_id, amount)
	}

	pub fn rebuy(
		&mut self,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		table_id: TableId,
		amount: u64,
	) -> AuthorityResult<()> {
		let already_seated = self.tables.get(&table_id).map(|t| t.seats.contains(&caller)).unwrap_or(false);
		let outcome = self.decide(
			Action::Rebuy,
			&club_id,
			&caller,
			None,
			Some(&table_id),
			true,
			Some(amount),
			already_seated,
		);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		let now = self.now();
		if let Err(e) = self.escrows.buy_in(&mut self.balances, &table_id, &caller, amount, now) {
			return AuthorityResult::failed(outcome, e);
		}
		let balance_after = self.balances.get(&caller).map(|b| b.available).unwrap_or(0);
		if let Err(e) = self.ledger.record_buy_in(caller.clone(), table_id.clone(), amount, balance_after, now) {
			return AuthorityResult::failed(outcome, e);
		}
		self.events.record(
			AuthorityEventType::PlayerReboughtTable,
			club_id,
			Some(table_id),
			caller,
			None,
			json!({ "amount": amount }),
			now,
		);
		AuthorityResult::allowed(outcome, ())
	}

	pub fn top_up(
		&mut self,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		table_id: TableId,
		amount: u64,
	) -> AuthorityResult<()> {
		let already_seated = self.tables.get(&table_id).map(|t| t.seats.contains(&caller)).unwrap_or(false);
		let outcome = self.decide(
			Action::TopUp,
			&club_id,
			&caller,
			None,
			Some(&table_id),
			true,
			Some(amount),
			already_seated,
		);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		let now = self.now();
		if let Err(e) = self.escrows.buy_in(&mut self.balances, &table_id, &caller, amount, now) {
			return AuthorityResult::failed(outcome, e);
		}
		let balance_after = self.balances.get(&caller).map(|b| b.available).unwrap_or(0);
		if let Err(e) = self.ledger.record_buy_in(caller.clone(), table_id.clone(), amount, balance_after, now) {
			return AuthorityResult::failed(outcome, e);
		}
		self.events.record(
			AuthorityEventType::PlayerToppedUpTable,
			club_id,
			Some(table_id),
			caller,
			None,
			json!({ "amount": amount }),
			now,
		);
		AuthorityResult::allowed(outcome, ())
	}

	// ---- Hand lifecycle --------------------------------------------------

	pub fn start_hand(
		&mut self,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		table_id: TableId,
		hand_id: HandId,
	) -> AuthorityResult<()> {
		let outcome = self.decide(Action::StartHand, &club_id, &caller, None, Some(&table_id), false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		let policy_hash = self.rake_config.policy_hash();
		let policy_id = self.rake_config.policy_id.clone();
		if let Some(table) = self.tables.get_mut(&table_id) {
			table.current_hand_id = Some(hand_id.clone());
			table.status = TableLifecycle::Active;
			table.rake_policy_snapshot = Some(RakePolicySnapshot { policy_id, policy_hash });
		}
		self.pots.open_hand(PotId::new(format!("pot_{hand_id}")), table_id.clone(), hand_id);
		let now = self.now();
		self.events
			.record(AuthorityEventType::HandStarted, club_id, Some(table_id), caller, None, json!({}), now);
		AuthorityResult::allowed(outcome, ())
	}

	/// Closes out a hand: clears the table's current-hand marker and the
	/// frozen rake policy snapshot, returning the table to `Open`. Spec §4.10
	/// lists this transition (`Active --end_hand--> Open`) but does not name
	/// a dedicated Authority API action for it, so this is called internally
	/// once settlement completes rather than exposed as its own action.
	pub fn end_hand(&mut self, table_id: &TableId) -> Result<(), AuthorityError> {
		let table = self
			.tables
			.get_mut(table_id)
			.ok_or_else(|| AuthorityError::TableNotFound(table_id.clone()))?;
		table.current_hand_id = None;
		table.rake_policy_snapshot = None;
		table.status = TableLifecycle::Open;
		Ok(())
	}

	pub fn force_action(
		&mut self,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		table_id: TableId,
		target: PlayerId,
		description: String,
	) -> AuthorityResult<()> {
		let outcome = self.decide(Action::ForceAction, &club_id, &caller, Some(&target), Some(&table_id), false, None, true);
		if !outcome.allowed {
			return AuthorityResult::denied(outcome);
		}
		let now = self.now();
		self.events.record(
			AuthorityEventType::ForceActionApplied,
			club_id,
			Some(table_id),
			caller,
			Some(target),
			json!({ "description": description }),
			now,
		);
		AuthorityResult::allowed(outcome, ())
	}

	/// Runs the Settlement Engine for a finished hand and, on success,
	/// transitions the table back to `Open` (spec §4.10's `end_hand`
	/// transition). Not part of the fixed Authority action enumeration —
	/// the hand-lifecycle component that decides a hand is over is external
	/// (spec §3's Non-goals exclude hand evaluation) — but every mutation
	/// it performs still goes through the same event stream.
	pub fn settle_hand(
		&mut self,
		club_id: economy_core::ClubId,
		caller: PlayerId,
		request: economy_core::SettlementRequest,
	) -> Result<economy_core::SettlementOutcome, AuthorityError> {
		let table_id = request.table_id.clone();
		let now = self.now();
		self.events.record(
			AuthorityEventType::SettlementStarted,
			club_id.clone(),
			Some(table_id.clone()),
			caller.clone(),
			None,
			json!({ "handId": request.hand_id.to_string() }),
			now,
		);

		let rake_config = self.rake_config.clone();
		let mut ctx = EconomyContext {
			balances: &mut self.balances,
			escrows: &mut self.escrows,
			ledger: &mut self.ledger,
		};
		let outcome = economy_core::SettlementEngine::settle_hand(
			request,
			&rake_config,
			&[],
			&mut self.pots,
			&mut ctx,
			&mut self.coordinator,
			&self.clock,
		)?;

		self.end_hand(&table_id)?;
		let now = self.now();
		self.events.record(
			AuthorityEventType::SettlementCompleted,
			club_id,
			Some(table_id),
			caller,
			None,
			json!({ "handId": outcome.hand_id.to_string(), "totalPot": outcome.total_pot, "rake": outcome.rake_collected }),
			now,
		);
		Ok(outcome)
	}

	pub fn invariant_violation_event(&mut self, club_id: economy_core::ClubId, caller: PlayerId, details: String) -> &AuthorityEvent {
		let now = self.now();
		self.events
			.record(AuthorityEventType::InvariantViolation, club_id, None, caller, None, json!({ "details": details }), now)
	}

	pub fn verify_invariants(&self) -> Vec<economy_core::InvariantCheck> {
		economy_core::verify_invariants(&self.balances, &self.escrows, &self.ledger)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use economy_core::FixedClock;

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

	fn new_authority() -> TableAuthority<FixedClock> {
		TableAuthority::new(FixedClock(1_000), zero_rake(), true)
	}

	#[test]
	fn owner_can_create_club_and_table_then_player_joins_and_buys_in() {
		let mut authority = new_authority();
		let club = economy_core::ClubId::new("club1");
		let owner = PlayerId::new("owner");
		let player = PlayerId::new("player1");

		let created = authority.create_club(
			club.clone(),
			owner.clone(),
			"Club One".into(),
			ClubConfig {
				min_buy_in: 10,
				max_buy_in: 1000,
			},
		);
		assert!(created.success);

		let table_id = TableId::new("t1");
		let created_table = authority.create_table(club.clone(), owner.clone(), table_id.clone(), 6);
		assert!(created_table.success);

		authority.clubs.invite_member(&club, player.clone());
		authority.balances.initialize(player.clone(), 500, 0).unwrap();

		let joined = authority.join_table(club.clone(), player.clone(), table_id.clone());
		assert!(joined.success);

		let bought_in = authority.buy_in(club.clone(), player.clone(), table_id.clone(), 100);
		assert!(bought_in.success, "{:?}", bought_in.error);
		assert_eq!(authority.escrows.get(&table_id, &player).unwrap().stack, 100);
	}

	#[test]
	fn non_member_buy_in_is_denied_without_touching_state() {
		let mut authority = new_authority();
		let club = economy_core::ClubId::new("club1");
		let owner = PlayerId::new("owner");
		let stranger = PlayerId::new("stranger");
		authority
			.create_club(
				club.clone(),
				owner.clone(),
				"Club One".into(),
				ClubConfig {
					min_buy_in: 10,
					max_buy_in: 1000,
				},
			)
			.data
			.unwrap();
		let table_id = TableId::new("t1");
		authority.create_table(club.clone(), owner.clone(), table_id.clone(), 6);

		let result = authority.buy_in(club, stranger, table_id, 50);
		assert!(!result.success);
		assert_eq!(result.authorization.denial_reason, Some(AuthorizationDenialReason::NotClubMember));
		assert_eq!(authority.events.len(), 3); // club_created, table_created, authorization_denied
	}

	#[test]
	fn manager_cannot_remove_another_manager() {
		let mut authority = new_authority();
		let club = economy_core::ClubId::new("club1");
		let owner = PlayerId::new("owner");
		let manager_a = PlayerId::new("manager_a");
		let manager_b = PlayerId::new("manager_b");
		authority
			.create_club(
				club.clone(),
				owner.clone(),
				"Club One".into(),
				ClubConfig {
					min_buy_in: 10,
					max_buy_in: 1000,
				},
			)
			.data
			.unwrap();
		authority.clubs.invite_member(&club, manager_a.clone());
		authority.clubs.invite_member(&club, manager_b.clone());
		authority.clubs.set_role(&club, &manager_a, Role::Manager);
		authority.clubs.set_role(&club, &manager_b, Role::Manager);

		let result = authority.remove_member(club, manager_a, manager_b);
		assert!(!result.success);
		assert_eq!(result.authorization.denial_reason, Some(AuthorizationDenialReason::CannotKickManager));
	}

	#[test]
	fn rake_policy_freezes_while_hand_in_progress() {
		let mut authority = new_authority();
		let club = economy_core::ClubId::new("club1");
		let owner = PlayerId::new("owner");
		authority
			.create_club(
				club.clone(),
				owner.clone(),
				"Club One".into(),
				ClubConfig {
					min_buy_in: 10,
					max_buy_in: 1000,
				},
			)
			.data
			.unwrap();
		let table_id = TableId::new("t1");
		authority.create_table(club.clone(), owner.clone(), table_id.clone(), 6);
		authority.start_hand(club.clone(), owner.clone(), table_id.clone(), HandId::new("h1"));

		let result = authority.update_rake_policy(club, owner, table_id, zero_rake());
		assert!(!result.success);
		assert_eq!(result.authorization.denial_reason, Some(AuthorizationDenialReason::RakePolicyLocked));
	}
}
