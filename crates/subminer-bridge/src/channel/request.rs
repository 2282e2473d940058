use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use subminer_core::error::{BridgeError, Result};
use subminer_core::protocol::{Envelope, Message, SenderTag};

use super::pending::PendingTable;
use crate::transport::{Route, Transport};

/// Correlated request channel over a one-way transport.
pub struct RequestChannel {
    transport: Arc<dyn Transport>,
    sender: SenderTag,
    instance_id: String,
    pending: Arc<PendingTable>,
    timeout: Duration,
}

impl RequestChannel {
    pub fn new(
        transport: Arc<dyn Transport>,
        sender: SenderTag,
        instance_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            sender,
            instance_id: instance_id.into(),
            pending: PendingTable::new(),
            timeout,
        }
    }

    pub fn sender(&self) -> SenderTag {
        self.sender
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    /// Wrap `message` in an envelope tagged with this channel's sender.
    pub fn envelope(&self, message: &Message) -> Result<Envelope> {
        Envelope::new(self.sender, message)
    }

    /// Fire-and-forget.
    pub async fn send(&self, route: Route, envelope: Envelope) -> Result<()> {
        self.transport.post(route, envelope).await
    }

    /// Correlated request: resolves with the `response` payload of the first
    /// envelope carrying the generated `messageId`, or fails with `Timeout`.
    pub async fn request(&self, route: Route, mut envelope: Envelope) -> Result<Value> {
        let message_id = Uuid::new_v4().to_string();
        envelope.set_message_id(&message_id)?;
        let command = envelope.header()?.command;

        // registered before the post so the reply cannot overtake it
        let (guard, rx) = self.pending.register(&message_id)?;

        tracing::debug!(%message_id, %command, ?route, "request");
        self.transport.post(route, envelope).await?;

        let res = match timeout(self.timeout, rx).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(_)) => Err(BridgeError::Internal("response channel closed".into())),
            Err(_) => {
                tracing::warn!(%message_id, %command, "request timed out");
                Err(BridgeError::Timeout {
                    command,
                    message_id: guard.message_id().to_string(),
                })
            }
        };
        drop(guard);
        res
    }

    /// `request` and decode the response payload.
    pub async fn request_as<T: DeserializeOwned>(&self, route: Route, envelope: Envelope) -> Result<T> {
        let v = self.request(route, envelope).await?;
        serde_json::from_value(v)
            .map_err(|e| BridgeError::BadMessage(format!("unexpected response shape: {e}")))
    }

    /// Try to resolve a pending request from an inbound envelope. Returns true
    /// when the envelope answered one of our requests. Envelopes tagged with
    /// this channel's own sender are never replies.
    pub fn resolve(&self, envelope: &Envelope) -> bool {
        // a window listener also sees its own posts; only peers answer
        if envelope.sender == self.sender {
            return false;
        }
        let Ok(header) = envelope.header() else {
            return false;
        };
        let Some(message_id) = header.message_id else {
            return false;
        };
        let resolved = self
            .pending
            .resolve(&message_id, header.response.unwrap_or(Value::Null));
        if resolved {
            tracing::debug!(%message_id, command = %header.command, "response correlated");
        }
        resolved
    }

    /// Identity filter: envelopes addressed to another instance are not ours.
    pub fn accepts(&self, envelope: &Envelope) -> bool {
        !envelope.addressed_elsewhere(&self.instance_id)
    }
}
