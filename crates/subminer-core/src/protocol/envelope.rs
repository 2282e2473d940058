//! Routing envelope.
//!
//! The message body is stored as `RawValue` so that routing (sender tag,
//! instance id, correlation id) never requires decoding the whole payload.
//! Only the component that owns a command decodes it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// Logical role of the context that produced an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SenderTag {
    /// Player page realm -> extension.
    #[serde(rename = "asbplayerv2")]
    Player,
    /// Extension -> player page realm.
    #[serde(rename = "asbplayer-extension-to-player")]
    ExtensionToPlayer,
    /// Extension background -> offscreen capture document.
    #[serde(rename = "asbplayer-extension-to-offscreen-document")]
    ExtensionToOffscreenDocument,
    /// Extension background -> content script hosting a video element.
    #[serde(rename = "asbplayer-extension-to-video")]
    ExtensionToVideo,
    /// Content script -> extension background.
    #[serde(rename = "asbplayer-video")]
    Video,
    /// Offscreen capture document -> extension background.
    #[serde(rename = "asbplayer-offscreen-document")]
    OffscreenDocument,
    /// Anything else posted on a shared channel (e.g. by the host page).
    #[serde(other)]
    Foreign,
}

impl SenderTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SenderTag::Player => "asbplayerv2",
            SenderTag::ExtensionToPlayer => "asbplayer-extension-to-player",
            SenderTag::ExtensionToOffscreenDocument => "asbplayer-extension-to-offscreen-document",
            SenderTag::ExtensionToVideo => "asbplayer-extension-to-video",
            SenderTag::Video => "asbplayer-video",
            SenderTag::OffscreenDocument => "asbplayer-offscreen-document",
            SenderTag::Foreign => "foreign",
        }
    }
}

/// Routing wrapper around one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub sender: SenderTag,
    /// Message body, stored as raw JSON (lazy parsing).
    pub message: Box<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Peer instance this envelope is addressed to (or was sent by).
    #[serde(
        default,
        rename = "asbplayerId",
        skip_serializing_if = "Option::is_none"
    )]
    pub instance_id: Option<String>,
}

/// The part of a message every router needs: command and correlation.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageHeader {
    pub command: String,
    #[serde(default, rename = "messageId")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub response: Option<Value>,
}

impl Envelope {
    /// Wrap a serializable message.
    pub fn new<M: Serialize>(sender: SenderTag, message: &M) -> Result<Self> {
        Ok(Self {
            sender,
            message: serde_json::value::to_raw_value(message)?,
            tab_id: None,
            src: None,
            instance_id: None,
        })
    }

    /// Build a response to a correlated message: same command and
    /// `messageId`, plus the `response` payload.
    pub fn response<R: Serialize>(
        sender: SenderTag,
        command: &str,
        message_id: &str,
        response: &R,
    ) -> Result<Self> {
        let body = serde_json::json!({
            "command": command,
            "messageId": message_id,
            "response": serde_json::to_value(response)?,
        });
        Self::new(sender, &body)
    }

    pub fn with_tab(mut self, tab_id: i64, src: impl Into<String>) -> Self {
        self.tab_id = Some(tab_id);
        self.src = Some(src.into());
        self
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Decode only the routing header of the message body.
    pub fn header(&self) -> Result<MessageHeader> {
        serde_json::from_str(self.message.get())
            .map_err(|e| BridgeError::BadMessage(format!("invalid message header: {e}")))
    }

    /// Decode the full message body into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(self.message.get())
            .map_err(|e| BridgeError::BadMessage(format!("invalid message body: {e}")))
    }

    /// Merge a correlation id into the message body.
    pub fn set_message_id(&mut self, message_id: &str) -> Result<()> {
        let mut body: Map<String, Value> = serde_json::from_str(self.message.get())
            .map_err(|e| BridgeError::BadMessage(format!("message body must be an object: {e}")))?;
        body.insert("messageId".into(), Value::String(message_id.to_string()));
        self.message = serde_json::value::to_raw_value(&body)?;
        Ok(())
    }

    /// True when the envelope is addressed to another peer instance.
    pub fn addressed_elsewhere(&self, own_instance_id: &str) -> bool {
        matches!(&self.instance_id, Some(id) if id != own_instance_id)
    }
}
