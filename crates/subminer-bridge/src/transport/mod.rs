//! Transport layer.
//!
//! Every environment primitive that moves an envelope between contexts
//! (`window.postMessage`, `runtime.sendMessage`, `tabs.sendMessage`) is a
//! `Transport::post` to a `Route`. Inbound envelopes arrive on the queue the
//! context service drains. `local` provides an in-process hub wiring many
//! contexts together.

pub mod local;

use async_trait::async_trait;

use subminer_core::error::Result;
use subminer_core::protocol::Envelope;

pub use local::{LocalHub, LocalPort};

/// Destination class of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Shared window of the page (page realm <-> content script).
    Window,
    /// Extension runtime (background process, offscreen document).
    Runtime,
    /// Content scripts injected into one tab.
    Tab(i64),
}

/// Envelope as delivered to a context, with the route it came from so a
/// responder can reply on it.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub envelope: Envelope,
    pub from: Route,
}

/// One-way post primitive. Delivery is asynchronous and best-effort; a post
/// only fails when no context can receive it at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, route: Route, envelope: Envelope) -> Result<()>;
}
