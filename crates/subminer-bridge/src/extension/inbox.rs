use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use subminer_core::error::Result;
use subminer_core::protocol::{Message, SenderTag};

use crate::dispatch::EnvelopeHandler;
use crate::presence::{HeartbeatEmitter, PeerSnapshot, PresenceDirectory};
use crate::subscribers::Subscribers;
use crate::transport::Inbound;

/// A non-`tabs` message from the extension, as handed to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionMessage {
    pub message: Value,
    pub tab_id: Option<i64>,
    pub src: Option<String>,
}

impl ExtensionMessage {
    pub fn command(&self) -> Option<&str> {
        self.message.get("command").and_then(Value::as_str)
    }
}

/// Handles everything the extension posts to the player realm.
pub(crate) struct PlayerInbox {
    pub(crate) directory: Arc<PresenceDirectory>,
    pub(crate) heartbeat: Arc<HeartbeatEmitter>,
    pub(crate) subscribers: Arc<Subscribers<ExtensionMessage>>,
}

#[async_trait]
impl EnvelopeHandler for PlayerInbox {
    fn sender(&self) -> SenderTag {
        SenderTag::ExtensionToPlayer
    }

    async fn handle(&self, inbound: Inbound) -> Result<()> {
        let env = inbound.envelope;
        let header = env.header()?;

        if header.command != "tabs" {
            let message = ExtensionMessage {
                message: env.decode::<Value>()?,
                tab_id: env.tab_id,
                src: env.src.clone(),
            };
            self.subscribers.emit(&message);
            return Ok(());
        }

        let Message::Tabs { tabs, asbplayers, ack_requested } = env.decode::<Message>()? else {
            return Ok(());
        };

        let snapshot = self.directory.replace(PeerSnapshot {
            tabs,
            players: asbplayers,
        });

        if ack_requested {
            self.heartbeat.ack(snapshot.tabs.clone()).await?;
        }
        Ok(())
    }
}
