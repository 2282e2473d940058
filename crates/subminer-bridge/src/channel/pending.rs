use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use subminer_core::error::{BridgeError, Result};

/// messageId -> resolver of the waiting request.
#[derive(Default)]
pub struct PendingTable {
    entries: DashMap<String, oneshot::Sender<Value>>,
}

impl PendingTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a resolver. The returned guard removes the entry when dropped,
    /// whichever way the request ends.
    pub fn register(self: &Arc<Self>, message_id: &str) -> Result<(PendingGuard, oneshot::Receiver<Value>)> {
        let (tx, rx) = oneshot::channel();
        match self.entries.entry(message_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(BridgeError::Internal(format!(
                    "message id already pending: {message_id}"
                )))
            }
            Entry::Vacant(v) => {
                v.insert(tx);
            }
        }

        let guard = PendingGuard {
            table: Arc::clone(self),
            message_id: message_id.to_string(),
        };
        Ok((guard, rx))
    }

    /// Resolve and remove the entry for `message_id`. Returns false when no
    /// request is waiting (unknown, already resolved, or timed out).
    pub fn resolve(&self, message_id: &str, response: Value) -> bool {
        let Some((_, tx)) = self.entries.remove(message_id) else {
            return false;
        };
        if tx.send(response).is_err() {
            tracing::debug!(%message_id, "requester went away before its response arrived");
        }
        true
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.entries.contains_key(message_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Scoped ownership of one pending entry.
pub struct PendingGuard {
    table: Arc<PendingTable>,
    message_id: String,
}

impl PendingGuard {
    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.table.entries.remove(&self.message_id);
    }
}
