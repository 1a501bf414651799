//! Service layer around `economy-core`: club registry, authorization
//! engine, authority event stream and the Table Authority that wires them
//! together into the single externally facing surface spec §6 describes.

pub mod actor;
pub mod authority;
pub mod authz;
pub mod club_registry;
pub mod config;
pub mod events;
pub mod logging;
pub mod rake_policy;

pub use actor::{ActorClosed, AuthorityActor, AuthorityHandle, Command};
pub use authority::{AuthorityError, AuthorityResult, AuthorizationOutcome, Table, TableAuthority, TableLifecycle};
pub use authz::{Action, AuthorizationContext, AuthorizationDenialReason, TableSnapshot, TableStatus};
pub use club_registry::{Club, ClubConfig, ClubRegistry, ClubRegistryError, ClubStatus, Role};
pub use config::EconomyServiceConfig;
pub use events::{AuthorityEvent, AuthorityEventLog, AuthorityEventType};
pub use rake_policy::{load_rake_config, RakePolicyError};
