//! Correlated request channel.
//!
//! Turns the fire-and-forget transport into request/response: each request
//! gets a fresh `messageId`, a pending entry, and a deadline. The context
//! pump feeds every inbound envelope to `RequestChannel::resolve` before any
//! other dispatch.

pub mod pending;
pub mod request;

pub use pending::{PendingGuard, PendingTable};
pub use request::RequestChannel;
