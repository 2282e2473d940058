//! Embedded UI frame bridge.
//!
//! The dialog UI runs in a frame injected into the host page. The frame is
//! created hidden from a bootstrap document the host supplies (so it keeps
//! a neutral origin), announces `ready`, and is then configured and shown
//! on demand. It stays alive between dialogs until `unbind`.

mod bridge;
mod client;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use subminer_core::error::Result;

pub use bridge::FrameBridge;
pub use client::FrameClient;

/// A created surface: its handle plus the messages it emits.
pub struct Surface {
    pub handle: std::sync::Arc<dyn SurfaceHandle>,
    pub messages: mpsc::Receiver<Value>,
}

/// Host page side of a live surface.
pub trait SurfaceHandle: Send + Sync {
    fn post(&self, message: Value) -> Result<()>;
    fn set_hidden(&self, hidden: bool);
    fn destroy(&self);
}

/// Creates surfaces in the host page.
#[async_trait]
pub trait SurfaceHost: Send + Sync {
    /// Create a hidden surface and write `document` into it.
    async fn create(&self, document: String) -> Result<Surface>;
}

/// Supplies the bootstrap document for a UI language.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn document(&self, language: &str) -> Result<String>;
}
