//! subminer core: wire contracts, error types, and capability flags.
//!
//! This crate defines the message envelope, the closed set of commands
//! exchanged between the page realm, content scripts, the background
//! process, the offscreen capture document and the embedded dialog frame,
//! plus the version gate used to decide which commands a peer understands.
//! It carries no runtime dependency so every context can share it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed
//! traffic surfaces as `BridgeError::BadMessage` instead of crashing the
//! listening context.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod capability;
pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{BridgeError, ErrorKind, Result};
pub use capability::{BrowserFamily, Capabilities, CapabilityGate};
