//! subminer bridge: the runtime side of cross-context messaging.
//!
//! Every context (player page, content script, background, offscreen
//! document) runs one `ContextService` that drains its inbound queue,
//! correlates responses through its `RequestChannel` and hands the rest to
//! the handler registered for the sender tag. The services built on top
//! (extension link, recorder, frame bridge, mining dialog) only talk
//! through that channel and the `Transport` trait.

pub mod channel;
pub mod config;
pub mod context;
pub mod dialog;
pub mod dispatch;
pub mod extension;
pub mod frame;
pub mod presence;
pub mod recorder;
pub mod settings;
pub mod subscribers;
pub mod transport;
