//! Presence: who else is reachable, and telling them we are alive.

mod directory;
mod heartbeat;

pub use directory::{PeerSnapshot, PresenceDirectory};
pub use heartbeat::{HeartbeatEmitter, HeartbeatOptions};
