//! Player realm <-> extension link: presence, settings and profile relays.

mod inbox;
mod link;

pub use inbox::ExtensionMessage;
pub use link::ExtensionLink;
