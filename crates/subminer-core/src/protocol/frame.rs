//! Messages exchanged with the embedded dialog frame.
//!
//! The frame speaks plain messages (no envelope): the host posts
//! `FrameCommand`s into it and receives `BridgeMessage`s back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// Fetch-proxy options handed to the frame: which page it serves and which
/// network origin it may reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOptions {
    pub video_src: String,
    pub allowed_fetch_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleRef {
    #[serde(default)]
    pub text: String,
    /// Milliseconds.
    pub start: f64,
    /// Milliseconds.
    pub end: f64,
    #[serde(default)]
    pub track: u32,
}

/// Dialog state saved when the dialog closes, replayed when it reopens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDialogState {
    pub subtitle: SubtitleRef,
    /// Playback position (ms) when the dialog was requested; 0 when unknown.
    #[serde(default)]
    pub dialog_requested_timestamp: f64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Host -> frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all_fields = "camelCase")]
pub enum FrameCommand {
    /// Sent once after `ready`, completes the handshake.
    #[serde(rename = "configure")]
    Configure {
        fetch_options: Option<FetchOptions>,
        language: String,
    },
    #[serde(rename = "state")]
    State { state: Value },
    #[serde(rename = "ankiSettings")]
    AnkiSettings { value: Value },
    #[serde(rename = "focus")]
    Focus,
    #[serde(rename = "rewind")]
    Rewind,
}

/// Frame -> host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all_fields = "camelCase")]
pub enum BridgeMessage {
    /// Handshake: the frame finished loading its bootstrap document.
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "resume")]
    Resume {
        ui_state: SavedDialogState,
        #[serde(default)]
        card_exported: bool,
    },
    #[serde(rename = "rewind")]
    Rewind { ui_state: SavedDialogState },
    #[serde(rename = "rerecord")]
    Rerecord {
        record_start: f64,
        record_end: f64,
        ui_state: SavedDialogState,
    },
    #[serde(rename = "openSettings")]
    OpenSettings,
    #[serde(rename = "copy-to-clipboard")]
    CopyToClipboard { data_url: String },
}

const BRIDGE_COMMANDS: &[&str] = &[
    "ready",
    "resume",
    "rewind",
    "rerecord",
    "openSettings",
    "copy-to-clipboard",
];

impl BridgeMessage {
    /// Decode a frame message, distinguishing unknown commands from
    /// malformed known ones.
    pub fn decode(value: &Value) -> Result<Self> {
        let command = value
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::BadMessage("frame message without command".into()))?;

        if !BRIDGE_COMMANDS.contains(&command) {
            return Err(BridgeError::UnknownCommand(command.to_string()));
        }

        Self::deserialize(value)
            .map_err(|e| BridgeError::BadMessage(format!("invalid {command} message: {e}")))
    }

    /// Terminal messages close the dialog; pass-through ones do not.
    pub fn closes_dialog(&self) -> bool {
        matches!(
            self,
            BridgeMessage::Resume { .. } | BridgeMessage::Rewind { .. } | BridgeMessage::Rerecord { .. }
        )
    }
}
