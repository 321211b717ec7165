//! Guest chat core for contact-center video escalation.
//!
//! Provisions a guest conversation, consumes its event stream, tracks
//! the member roster and surfaces the call-progress signals a native
//! shell needs to hand the visitor over to the conference UI.
//!
//! Pure Rust crate with no platform dependencies.

pub mod errors;
pub mod events;
pub mod processor;
pub mod provision;
pub mod roster;
pub mod session;
pub mod settings;
pub mod side_channel;
pub mod signals;

pub use errors::ChatError;
pub use provision::{
    ChatCredentials, ChatProvisioner, MemberInfo, ProvisionConfig, ProvisionedMember,
    RoutingTarget,
};
pub use roster::{Member, MemberRole, MemberState, Roster};
pub use session::{ChatSession, SessionState};
pub use settings::{Settings, SettingsStore};
pub use signals::TicketProgressListener;
