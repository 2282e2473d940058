//! subminer: cross-context messaging for the mining extension.
//!
//! `core` holds the wire contracts shared by every context, `bridge` the
//! runtime services built on them. Depend on this crate to get both.

pub mod core {
    pub use subminer_core::*;
}

pub mod bridge {
    pub use subminer_bridge::*;
}
