//! Per-context listener service.
//!
//! Each execution context (page realm, content script, background,
//! offscreen document) owns exactly one `ContextService`, constructed once
//! with its inbound queue and stopped on teardown.

pub mod service;

pub use service::ContextService;
