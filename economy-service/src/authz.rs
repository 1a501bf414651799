//! Authorization Engine: a pure function from an `AuthorizationContext` to
//! an allow/deny decision. No state lives here; `TableAuthority` builds the
//! context from the Club Registry and table state on every call.

use serde::{Deserialize, Serialize};

use crate::club_registry::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
	CreateClub,
	UpdateClubConfig,
	UpdateRakePolicy,
	DeleteClub,
	InviteMember,
	AcceptInvitation,
	RemoveMember,
	BanMember,
	UnbanMember,
	PromoteToManager,
	DemoteFromManager,
	TransferOwnership,
	CreateTable,
	CloseTable,
	PauseTable,
	ResumeTable,
	JoinTable,
	LeaveTable,
	BuyIn,
	CashOut,
	Rebuy,
	TopUp,
	KickPlayer,
	StartHand,
	ForceAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationDenialReason {
	NotClubMember,
	InsufficientRole,
	MemberBanned,
	MemberLeft,
	TableNotFound,
	TableClosed,
	TablePaused,
	HandInProgress,
	NoHandInProgress,
	PlayerNotAtTable,
	PlayerAlreadyAtTable,
	TableFull,
	InsufficientBalance,
	BuyInBelowMinimum,
	BuyInAboveMaximum,
	RebuyNotAllowed,
	TopUpNotAllowed,
	RakePolicyLocked,
	CannotKickOwner,
	CannotKickManager,
	CannotDemoteOwner,
	SelfActionNotAllowed,
	InvalidTarget,
	ClubNotActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
	Open,
	Active,
	Paused,
	Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct TableSnapshot {
	pub status: TableStatus,
	pub hand_in_progress: bool,
	pub occupied_seats: u32,
	pub max_seats: u32,
}

/// Everything the Authorization Engine needs to decide one call. Built
/// fresh by the Table Authority from the Club Registry and table state for
/// every single action — it never persists.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
	pub action: Action,
	pub caller_role: Option<Role>,
	pub caller_banned: bool,
	pub caller_left: bool,
	pub club_active: bool,
	pub target_role: Option<Role>,
	pub is_self_action: bool,
	pub table: Option<TableSnapshot>,
	pub buy_in_amount: Option<u64>,
	pub caller_available_balance: Option<u64>,
	pub min_buy_in: Option<u64>,
	pub max_buy_in: Option<u64>,
	pub rebuy_allowed: bool,
	pub top_up_allowed: bool,
	pub rake_policy_locked: bool,
	pub player_already_at_table: bool,
}

fn minimum_role(action: Action) -> Option<Role> {
	use Action::*;
	match action {
		CreateClub => None,
		UpdateClubConfig | UpdateRakePolicy | DeleteClub | TransferOwnership | PromoteToManager | DemoteFromManager => {
			Some(Role::Owner)
		}
		CreateTable | CloseTable | PauseTable | ResumeTable | KickPlayer | StartHand | ForceAction | InviteMember
		| RemoveMember | BanMember | UnbanMember => Some(Role::Manager),
		JoinTable | LeaveTable | BuyIn | CashOut | Rebuy | TopUp | AcceptInvitation => Some(Role::Player),
	}
}

fn role_at_least(role: Role, minimum: Role) -> bool {
	role >= minimum
}

/// Decides one Authority API call. Returns `Ok(())` on allow, or the
/// `AuthorizationDenialReason` the call should be rejected with.
pub fn authorize(ctx: &AuthorizationContext) -> Result<(), AuthorizationDenialReason> {
	use Action::*;

	if !ctx.club_active && ctx.action != Action::CreateClub {
		return Err(AuthorizationDenialReason::ClubNotActive);
	}

	if ctx.action != Action::CreateClub {
		let role = ctx.caller_role.ok_or(AuthorizationDenialReason::NotClubMember)?;
		if ctx.caller_banned {
			return Err(AuthorizationDenialReason::MemberBanned);
		}
		if ctx.caller_left {
			return Err(AuthorizationDenialReason::MemberLeft);
		}
		if let Some(minimum) = minimum_role(ctx.action) {
			if !role_at_least(role, minimum) {
				return Err(AuthorizationDenialReason::InsufficientRole);
			}
		}
	}

	match ctx.action {
		JoinTable | LeaveTable | BuyIn | CashOut | Rebuy | TopUp | AcceptInvitation => {
			if !ctx.is_self_action {
				return Err(AuthorizationDenialReason::SelfActionNotAllowed);
			}
		}
		KickPlayer | RemoveMember | BanMember => {
			if ctx.target_role == Some(Role::Owner) {
				return Err(AuthorizationDenialReason::CannotKickOwner);
			}
			if ctx.target_role == Some(Role::Manager) {
				return Err(AuthorizationDenialReason::CannotKickManager);
			}
		}
		DemoteFromManager => {
			if ctx.target_role == Some(Role::Owner) {
				return Err(AuthorizationDenialReason::CannotDemoteOwner);
			}
		}
		_ => {}
	}

	match ctx.action {
		LeaveTable | CashOut | Rebuy | StartHand | UpdateRakePolicy => {
			let table = ctx.table.ok_or(AuthorizationDenialReason::TableNotFound)?;
			if ctx.action == UpdateRakePolicy {
				if ctx.rake_policy_locked {
					return Err(AuthorizationDenialReason::RakePolicyLocked);
				}
			} else if table.hand_in_progress {
				return Err(AuthorizationDenialReason::HandInProgress);
			}
		}
		_ => {}
	}

	if ctx.action == JoinTable {
		let table = ctx.table.ok_or(AuthorizationDenialReason::TableNotFound)?;
		if table.status == TableStatus::Closed {
			return Err(AuthorizationDenialReason::TableClosed);
		}
		if table.occupied_seats >= table.max_seats {
			return Err(AuthorizationDenialReason::TableFull);
		}
		if ctx.player_already_at_table {
			return Err(AuthorizationDenialReason::PlayerAlreadyAtTable);
		}
	}

	if ctx.action == BuyIn {
		let table = ctx.table.ok_or(AuthorizationDenialReason::TableNotFound)?;
		if table.status == TableStatus::Closed {
			return Err(AuthorizationDenialReason::TableClosed);
		}
		if table.status == TableStatus::Paused {
			return Err(AuthorizationDenialReason::TablePaused);
		}
		let amount = ctx.buy_in_amount.ok_or(AuthorizationDenialReason::InvalidTarget)?;
		if let Some(min) = ctx.min_buy_in {
			if amount < min {
				return Err(AuthorizationDenialReason::BuyInBelowMinimum);
			}
		}
		if let Some(max) = ctx.max_buy_in {
			if amount > max {
				return Err(AuthorizationDenialReason::BuyInAboveMaximum);
			}
		}
		if let Some(available) = ctx.caller_available_balance {
			if amount > available {
				return Err(AuthorizationDenialReason::InsufficientBalance);
			}
		}
		if !ctx.player_already_at_table {
			return Err(AuthorizationDenialReason::PlayerNotAtTable);
		}
	}

	if ctx.action == Rebuy && !ctx.rebuy_allowed {
		return Err(AuthorizationDenialReason::RebuyNotAllowed);
	}
	if ctx.action == TopUp && !ctx.top_up_allowed {
		return Err(AuthorizationDenialReason::TopUpNotAllowed);
	}

	if matches!(ctx.action, CashOut) && !ctx.player_already_at_table {
		return Err(AuthorizationDenialReason::PlayerNotAtTable);
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn base_ctx(action: Action) -> AuthorizationContext {
		AuthorizationContext {
			action,
			caller_role: Some(Role::Player),
			caller_banned: false,
			caller_left: false,
			club_active: true,
			target_role: None,
			is_self_action: true,
			table: None,
			buy_in_amount: None,
			caller_available_balance: None,
			min_buy_in: None,
			max_buy_in: None,
			rebuy_allowed: true,
			top_up_allowed: true,
			rake_policy_locked: false,
			player_already_at_table: true,
		}
	}

	#[test]
	fn player_cannot_start_hand() {
		let mut ctx = base_ctx(Action::StartHand);
		ctx.table = Some(TableSnapshot {
			status: TableStatus::Open,
			hand_in_progress: false,
			occupied_seats: 2,
			max_seats: 6,
		});
		assert_eq!(authorize(&ctx), Err(AuthorizationDenialReason::InsufficientRole));
	}

	#[test]
	fn manager_cannot_kick_owner() {
		let mut ctx = base_ctx(Action::KickPlayer);
		ctx.caller_role = Some(Role::Manager);
		ctx.is_self_action = false;
		ctx.target_role = Some(Role::Owner);
		assert_eq!(authorize(&ctx), Err(AuthorizationDenialReason::CannotKickOwner));
	}

	#[test]
	fn buy_in_below_minimum_denied() {
		let mut ctx = base_ctx(Action::BuyIn);
		ctx.table = Some(TableSnapshot {
			status: TableStatus::Open,
			hand_in_progress: false,
			occupied_seats: 1,
			max_seats: 6,
		});
		ctx.buy_in_amount = Some(5);
		ctx.min_buy_in = Some(10);
		ctx.caller_available_balance = Some(1000);
		assert_eq!(authorize(&ctx), Err(AuthorizationDenialReason::BuyInBelowMinimum));
	}

	#[test]
	fn rake_policy_change_denied_while_locked() {
		let mut ctx = base_ctx(Action::UpdateRakePolicy);
		ctx.caller_role = Some(Role::Owner);
		ctx.is_self_action = false;
		ctx.table = Some(TableSnapshot {
			status: TableStatus::Active,
			hand_in_progress: true,
			occupied_seats: 4,
			max_seats: 6,
		});
		ctx.rake_policy_locked = true;
		assert_eq!(authorize(&ctx), Err(AuthorizationDenialReason::RakePolicyLocked));
	}

	#[test]
	fn self_buy_in_within_range_allowed() {
		let mut ctx = base_ctx(Action::BuyIn);
		ctx.table = Some(TableSnapshot {
			status: TableStatus::Open,
			hand_in_progress: false,
			occupied_seats: 1,
			max_seats: 6,
		});
		ctx.buy_in_amount = Some(100);
		ctx.min_buy_in = Some(10);
		ctx.max_buy_in = Some(1000);
		ctx.caller_available_balance = Some(1000);
		assert_eq!(authorize(&ctx), Ok(()));
	}
}
