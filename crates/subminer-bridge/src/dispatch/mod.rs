//! Sender-tag routing inside one context.
//!
//! A context registers one `EnvelopeHandler` per role it answers to; the
//! context pump hands every uncorrelated envelope to `Dispatcher::dispatch`.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, EnvelopeHandler};
