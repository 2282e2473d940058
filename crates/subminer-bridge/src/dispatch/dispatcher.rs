use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use subminer_core::error::{BridgeError, Result};
use subminer_core::protocol::SenderTag;

use crate::transport::Inbound;

/// A component that owns the envelopes of one sender role in a context.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    fn sender(&self) -> SenderTag;
    async fn handle(&self, inbound: Inbound) -> Result<()>;
}

/// Routes inbound envelopes to the handler registered for their sender tag.
#[derive(Default)]
pub struct Dispatcher {
    handlers: DashMap<SenderTag, Arc<dyn EnvelopeHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    pub fn register(&self, handler: Arc<dyn EnvelopeHandler>) {
        let tag = handler.sender();
        if self.handlers.insert(tag, handler).is_some() {
            tracing::warn!(sender = tag.as_str(), "handler replaced");
        }
    }

    pub fn unregister(&self, sender: SenderTag) {
        self.handlers.remove(&sender);
    }

    pub fn handles(&self, sender: SenderTag) -> bool {
        self.handlers.contains_key(&sender)
    }

    pub fn registered(&self) -> Vec<SenderTag> {
        self.handlers.iter().map(|e| *e.key()).collect()
    }

    pub fn clear(&self) {
        self.handlers.clear();
    }

    pub async fn dispatch(&self, inbound: Inbound) -> Result<()> {
        let tag = inbound.envelope.sender;
        let handler = self
            .handlers
            .get(&tag)
            .ok_or_else(|| BridgeError::UnknownCommand(format!("no handler for sender {}", tag.as_str())))?
            .value()
            .clone();
        handler.handle(inbound).await
    }
}
