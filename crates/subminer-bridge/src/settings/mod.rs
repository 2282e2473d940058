//! Key/value settings storage and the update alert built on it.

mod memory;
mod update_alert;

use async_trait::async_trait;
use serde_json::{Map, Value};

use subminer_core::error::Result;

pub use memory::MemorySettings;
pub use update_alert::{enqueue_update_alert, should_show_update_alert};

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_single(&self, key: &str) -> Result<Option<Value>>;

    /// Values for the requested keys, falling back to the given defaults.
    async fn get(&self, keys_and_defaults: Map<String, Value>) -> Result<Map<String, Value>>;

    /// Merge `partial` into the store.
    async fn set(&self, partial: Map<String, Value>) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}
