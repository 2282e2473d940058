//! Wire protocol shared by every context.
//!
//! - `envelope`: routing wrapper with a lazily decoded message body.
//! - `message`: closed set of commands exchanged between contexts.
//! - `frame`: commands exchanged with the embedded dialog frame.
//! - `model`: payload records (tabs, player instances, cards, audio).
//!
//! All decoders are panic-free: malformed input is reported as
//! `BridgeError::BadMessage`.

pub mod envelope;
pub mod frame;
pub mod message;
pub mod model;

pub use envelope::{Envelope, MessageHeader, SenderTag};
pub use frame::{BridgeMessage, FrameCommand, FetchOptions};
pub use message::Message;
