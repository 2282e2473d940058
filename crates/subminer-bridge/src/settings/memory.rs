use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use subminer_core::error::Result;

use super::SettingsStore;

/// Process-local store.
#[derive(Default)]
pub struct MemorySettings {
    values: DashMap<String, Value>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(values: Map<String, Value>) -> Self {
        let store = Self::new();
        for (k, v) in values {
            store.values.insert(k, v);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get_single(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn get(&self, keys_and_defaults: Map<String, Value>) -> Result<Map<String, Value>> {
        Ok(keys_and_defaults
            .into_iter()
            .map(|(k, default)| {
                let v = self.values.get(&k).map(|v| v.value().clone()).unwrap_or(default);
                (k, v)
            })
            .collect())
    }

    async fn set(&self, partial: Map<String, Value>) -> Result<()> {
        for (k, v) in partial {
            self.values.insert(k, v);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}
