//! Single-writer mailbox around `TableAuthority`, so every call into the
//! economy core is serialized through one task per spec §5's
//! actor-per-table discipline. Modeled on the teacher's worker actor
//! (message enum + oneshot reply channel, `log::info!(target: ..., ...)`
//! on dispatch) rather than a full per-table scheduler: this crate runs
//! one authority actor per service instance, which the concurrency model
//! still satisfies as long as nothing calls into `TableAuthority` from
//! outside the mailbox loop.

use economy_core::{Clock, ClubId, HandId, PlayerId, RakeConfig, SettlementOutcome, SettlementRequest, TableId};
use tokio::sync::oneshot;

use crate::authority::{AuthorityError, AuthorityResult, TableAuthority};
use crate::club_registry::ClubConfig;

type Reply<T> = oneshot::Sender<T>;

pub enum Command {
	CreateClub {
		club_id: ClubId,
		caller: PlayerId,
		name: String,
		config: ClubConfig,
		reply: Reply<AuthorityResult<()>>,
	},
	CreateTable {
		club_id: ClubId,
		caller: PlayerId,
		table_id: TableId,
		max_seats: u32,
		reply: Reply<AuthorityResult<()>>,
	},
	JoinTable {
		club_id: ClubId,
		caller: PlayerId,
		table_id: TableId,
		reply: Reply<AuthorityResult<()>>,
	},
	BuyIn {
		club_id: ClubId,
		caller: PlayerId,
		table_id: TableId,
		amount: u64,
		reply: Reply<AuthorityResult<()>>,
	},
	CashOut {
		club_id: ClubId,
		caller: PlayerId,
		table_id: TableId,
		amount: Option<u64>,
		reply: Reply<AuthorityResult<u64>>,
	},
	StartHand {
		club_id: ClubId,
		caller: PlayerId,
		table_id: TableId,
		hand_id: HandId,
		reply: Reply<AuthorityResult<()>>,
	},
	SettleHand {
		club_id: ClubId,
		caller: PlayerId,
		request: SettlementRequest,
		reply: Reply<Result<SettlementOutcome, AuthorityError>>,
	},
}

/// Runs the mailbox loop on the current task. Intended to be spawned once
/// with `tokio::spawn` at service startup.
pub struct AuthorityActor<C: Clock> {
	authority: TableAuthority<C>,
	inbox: async_channel::Receiver<Command>,
}

impl<C: Clock + 'static> AuthorityActor<C> {
	pub fn spawn(clock: C, rake_config: RakeConfig, idempotency_enabled: bool) -> AuthorityHandle {
		let (sender, inbox) = async_channel::unbounded();
		let actor = AuthorityActor {
			authority: TableAuthority::new(clock, rake_config, idempotency_enabled),
			inbox,
		};
		tokio::spawn(actor.run());
		AuthorityHandle { sender }
	}

	async fn run(mut self) {
		log::info!(target: "authority-actor", "mailbox loop started");
		while let Ok(command) = self.inbox.recv().await {
			self.dispatch(command);
		}
		log::info!(target: "authority-actor", "mailbox loop exiting, sender side closed");
	}

	fn dispatch(&mut self, command: Command) {
		match command {
			Command::CreateClub {
				club_id,
				caller,
				name,
				config,
				reply,
			} => {
				let result = self.authority.create_club(club_id, caller, name, config);
				let _ = reply.send(result);
			}
			Command::CreateTable {
				club_id,
				caller,
				table_id,
				max_seats,
				reply,
			} => {
				let result = self.authority.create_table(club_id, caller, table_id, max_seats);
				let _ = reply.send(result);
			}
			Command::JoinTable {
				club_id,
				caller,
				table_id,
				reply,
			} => {
				let result = self.authority.join_table(club_id, caller, table_id);
				let _ = reply.send(result);
			}
			Command::BuyIn {
				club_id,
				caller,
				table_id,
				amount,
				reply,
			} => {
				let result = self.authority.buy_in(club_id, caller, table_id, amount);
				let _ = reply.send(result);
			}
			Command::CashOut {
				club_id,
				caller,
				table_id,
				amount,
				reply,
			} => {
				let result = self.authority.cash_out(club_id, caller, table_id, amount);
				let _ = reply.send(result);
			}
			Command::StartHand {
				club_id,
				caller,
				table_id,
				hand_id,
				reply,
			} => {
				let result = self.authority.start_hand(club_id, caller, table_id, hand_id);
				let _ = reply.send(result);
			}
			Command::SettleHand {
				club_id,
				caller,
				request,
				reply,
			} => {
				let result = self.authority.settle_hand(club_id, caller, request);
				let _ = reply.send(result);
			}
		}
	}
}

/// A cheaply cloneable handle used by callers outside the mailbox task.
#[derive(Clone)]
pub struct AuthorityHandle {
	sender: async_channel::Sender<Command>,
}

#[derive(Debug, thiserror::Error)]
#[error("authority actor mailbox closed before a reply was received")]
pub struct ActorClosed;

impl AuthorityHandle {
	async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, ActorClosed> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.sender.send(build(reply_tx)).await.map_err(|_| ActorClosed)?;
		reply_rx.await.map_err(|_| ActorClosed)
	}

	pub async fn create_club(&self, club_id: ClubId, caller: PlayerId, name: String, config: ClubConfig) -> Result<AuthorityResult<()>, ActorClosed> {
		self.call(|reply| Command::CreateClub {
			club_id,
			caller,
			name,
			config,
			reply,
		})
		.await
	}

	pub async fn create_table(&self, club_id: ClubId, caller: PlayerId, table_id: TableId, max_seats: u32) -> Result<AuthorityResult<()>, ActorClosed> {
		self.call(|reply| Command::CreateTable {
			club_id,
			caller,
			table_id,
			max_seats,
			reply,
		})
		.await
	}

	pub async fn join_table(&self, club_id: ClubId, caller: PlayerId, table_id: TableId) -> Result<AuthorityResult<()>, ActorClosed> {
		self.call(|reply| Command::JoinTable {
			club_id,
			caller,
			table_id,
			reply,
		})
		.await
	}

	pub async fn buy_in(&self, club_id: ClubId, caller: PlayerId, table_id: TableId, amount: u64) -> Result<AuthorityResult<()>, ActorClosed> {
		self.call(|reply| Command::BuyIn {
			club_id,
			caller,
			table_id,
			amount,
			reply,
		})
		.await
	}

	pub async fn cash_out(&self, club_id: ClubId, caller: PlayerId, table_id: TableId, amount: Option<u64>) -> Result<AuthorityResult<u64>, ActorClosed> {
		self.call(|reply| Command::CashOut {
			club_id,
			caller,
			table_id,
			amount,
			reply,
		})
		.await
	}

	pub async fn start_hand(&self, club_id: ClubId, caller: PlayerId, table_id: TableId, hand_id: HandId) -> Result<AuthorityResult<()>, ActorClosed> {
		self.call(|reply| Command::StartHand {
			club_id,
			caller,
			table_id,
			hand_id,
			reply,
		})
		.await
	}

	pub async fn settle_hand(&self, club_id: ClubId, caller: PlayerId, request: SettlementRequest) -> Result<Result<SettlementOutcome, AuthorityError>, ActorClosed> {
		self.call(|reply| Command::SettleHand {
			club_id,
			caller,
			request,
			reply,
		})
		.await
	}
}
