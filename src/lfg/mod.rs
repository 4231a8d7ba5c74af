//! Group finder ("looking for group") sessions
//!
//! A session tracks who holds the tank, healer and dps slots of one listing
//! message. Sessions are persisted on every change and reloaded on restart.

pub mod custom_id;
pub mod manager;
pub mod render;
pub mod session;
pub mod slots;

pub use custom_id::{ButtonAction, LfgButtonId};
pub use manager::{LfgManager, PressReply};
pub use render::{RosterLine, SessionView};
pub use session::{LfgListing, LfgSession, PressOutcome, PressResult, SessionState};
pub use slots::RoleSlots;
