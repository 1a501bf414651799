//! Club Registry: clubs, memberships, roles and ban lists. Spec §4.10/§6
//! assume this collaborator exists but never fully specify its shape; this
//! is the minimal in-process implementation the Authorization Engine needs
//! to be runnable, modeled as the `Map`-of-`Set` index style of spec §9
//! ("club→members, player→clubs... owned by the Club Registry actor").

use std::collections::{HashMap, HashSet};

use economy_core::{ClubId, PlayerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
	Player,
	Manager,
	Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClubStatus {
	Active,
	Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClubConfig {
	pub min_buy_in: u64,
	pub max_buy_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Club {
	pub club_id: ClubId,
	pub name: String,
	pub owner: PlayerId,
	pub status: ClubStatus,
	pub config: ClubConfig,
}

#[derive(Debug, Clone)]
struct Membership {
	role: Role,
	banned: bool,
	left: bool,
}

#[derive(Debug, Default)]
pub struct ClubRegistry {
	clubs: HashMap<ClubId, Club>,
	memberships: HashMap<(ClubId, PlayerId), Membership>,
	/// player -> clubs they belong to (including past, banned, or left
	/// memberships — membership state itself decides visibility). This is
	/// the index Open Question 1 of spec §9 requires `canViewPlayer` to
	/// actually consult instead of granting any non-empty owner blanket
	/// visibility.
	player_clubs: HashMap<PlayerId, HashSet<ClubId>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClubRegistryError {
	#[error("club {0} not found")]
	ClubNotFound(ClubId),
	#[error("club {0} already exists")]
	ClubAlreadyExists(ClubId),
	#[error("player {0} is not a member of club {1}")]
	NotAMember(PlayerId, ClubId),
}

impl ClubRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn create_club(&mut self, club_id: ClubId, name: String, owner: PlayerId, config: ClubConfig) -> Result<(), ClubRegistryError> {
		if self.clubs.contains_key(&club_id) {
			return Err(ClubRegistryError::ClubAlreadyExists(club_id));
		}
		self.clubs.insert(
			club_id.clone(),
			Club {
				club_id: club_id.clone(),
				name,
				owner: owner.clone(),
				status: ClubStatus::Active,
				config,
			},
		);
		self.memberships.insert(
			(club_id.clone(), owner.clone()),
			Membership {
				role: Role::Owner,
				banned: false,
				left: false,
			},
		);
		self.player_clubs.entry(owner).or_default().insert(club_id);
		Ok(())
	}

	pub fn club(&self, club_id: &ClubId) -> Option<&Club> {
		self.clubs.get(club_id)
	}

	pub fn club_mut(&mut self, club_id: &ClubId) -> Option<&mut Club> {
		self.clubs.get_mut(club_id)
	}

	pub fn delete_club(&mut self, club_id: &ClubId) -> Result<(), ClubRegistryError> {
		let club = self
			.clubs
			.get_mut(club_id)
			.ok_or_else(|| ClubRegistryError::ClubNotFound(club_id.clone()))?;
		club.status = ClubStatus::Deleted;
		Ok(())
	}

	pub fn role_of(&self, club_id: &ClubId, player: &PlayerId) -> Option<Role> {
		self.memberships
			.get(&(club_id.clone(), player.clone()))
			.filter(|m| !m.banned && !m.left)
			.map(|m| m.role)
	}

	pub fn is_banned(&self, club_id: &ClubId, player: &PlayerId) -> bool {
		self.memberships
			.get(&(club_id.clone(), player.clone()))
			.map(|m| m.banned)
			.unwrap_or(false)
	}

	pub fn has_left(&self, club_id: &ClubId, player: &PlayerId) -> bool {
		self.memberships
			.get(&(club_id.clone(), player.clone()))
			.map(|m| m.left)
			.unwrap_or(false)
	}

	pub fn invite_member(&mut self, club_id: &ClubId, player: PlayerId) {
		self.memberships
			.entry((club_id.clone(), player.clone()))
			.or_insert(Membership {
				role: Role::Player,
				banned: false,
				left: false,
			});
		self.player_clubs.entry(player).or_default().insert(club_id.clone());
	}

	pub fn remove_member(&mut self, club_id: &ClubId, player: &PlayerId) {
		if let Some(m) = self.memberships.get_mut(&(club_id.clone(), player.clone())) {
			m.left = true;
		}
	}

	pub fn ban_member(&mut self, club_id: &ClubId, player: &PlayerId) {
		if let Some(m) = self.memberships.get_mut(&(club_id.clone(), player.clone())) {
			m.banned = true;
		}
	}

	pub fn unban_member(&mut self, club_id: &ClubId, player: &PlayerId) {
		if let Some(m) = self.memberships.get_mut(&(club_id.clone(), player.clone())) {
			m.banned = false;
		}
	}

	pub fn set_role(&mut self, club_id: &ClubId, player: &PlayerId, role: Role) {
		if let Some(m) = self.memberships.get_mut(&(club_id.clone(), player.clone())) {
			m.role = role;
		}
	}

	pub fn transfer_ownership(&mut self, club_id: &ClubId, new_owner: &PlayerId) -> Result<(), ClubRegistryError> {
		let club = self
			.clubs
			.get_mut(club_id)
			.ok_or_else(|| ClubRegistryError::ClubNotFound(club_id.clone()))?;
		let old_owner = club.owner.clone();
		club.owner = new_owner.clone();
		if let Some(m) = self.memberships.get_mut(&(club_id.clone(), old_owner)) {
			m.role = Role::Manager;
		}
		self.set_role(club_id, new_owner, Role::Owner);
		Ok(())
	}

	/// Resolves Open Question 1 of spec §9: a viewer may see a target only
	/// if the viewer is OWNER or MANAGER of a club the target actually
	/// belongs to, rather than any non-empty club ownership granting
	/// blanket visibility.
	pub fn can_view_player(&self, viewer: &PlayerId, target: &PlayerId) -> bool {
		let Some(viewer_clubs) = self.player_clubs.get(viewer) else {
			return false;
		};
		let Some(target_clubs) = self.player_clubs.get(target) else {
			return false;
		};
		viewer_clubs.intersection(target_clubs).any(|club_id| {
			matches!(self.role_of(club_id, viewer), Some(Role::Owner) | Some(Role::Manager))
				&& self.role_of(club_id, target).is_some()
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn owner_outside_shared_club_cannot_view_player() {
		let mut registry = ClubRegistry::new();
		let owner = PlayerId::new("owner");
		let stranger = PlayerId::new("stranger");
		registry
			.create_club(
				ClubId::new("club1"),
				"Club One".into(),
				owner.clone(),
				ClubConfig {
					min_buy_in: 10,
					max_buy_in: 1000,
				},
			)
			.unwrap();
		assert!(!registry.can_view_player(&owner, &stranger));
	}

	#[test]
	fn owner_can_view_member_of_shared_club() {
		let mut registry = ClubRegistry::new();
		let owner = PlayerId::new("owner");
		let member = PlayerId::new("member");
		registry
			.create_club(
				ClubId::new("club1"),
				"Club One".into(),
				owner.clone(),
				ClubConfig {
					min_buy_in: 10,
					max_buy_in: 1000,
				},
			)
			.unwrap();
		registry.invite_member(&ClubId::new("club1"), member.clone());
		assert!(registry.can_view_player(&owner, &member));
	}
}
