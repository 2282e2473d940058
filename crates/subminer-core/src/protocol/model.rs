//! Payload records carried inside messages.

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// One open tab hosting a video element the extension can sync with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTab {
    pub id: i64,
    pub title: String,
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    #[serde(default)]
    pub subscribed: bool,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub synced_timestamp: u64,
}

/// One live player instance (page, side panel or video surface).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInstance {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    #[serde(default)]
    pub side_panel: bool,
    #[serde(default)]
    pub video_player: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Last heartbeat, milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: u64,
}

/// Named settings profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
}

/// A mined card published to other surfaces. Only the fields the core
/// inspects are typed; everything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(default)]
    pub subtitle_file_name: String,
    #[serde(default)]
    pub media_timestamp: f64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Error reported by a capturing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordingError {
    /// The capture stream could not be opened (permissions, tab gone).
    NoPermission,
    /// `stop` arrived while nothing was recording.
    NotRecording,
    /// The capture backend failed mid-recording.
    CaptureFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRecordingResponse {
    pub started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RecordingError>,
}

impl StartRecordingResponse {
    pub fn started() -> Self {
        Self { started: true, error: None }
    }

    pub fn failed(error: RecordingError) -> Self {
        Self { started: false, error: Some(error) }
    }
}

/// Encoded audio as carried on the wire (base64 body plus file extension).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedAudio {
    pub base64: String,
    /// `mp3`, or the capture backend's native container when mp3 was not
    /// available (e.g. `webm`).
    pub extension: String,
}

impl EncodedAudio {
    pub fn encode(data: &[u8], extension: impl Into<String>) -> Self {
        Self {
            base64: base64::engine::general_purpose::STANDARD.encode(data),
            extension: extension.into(),
        }
    }

    pub fn is_mp3(&self) -> bool {
        self.extension == "mp3"
    }

    pub fn decode(&self) -> Result<Bytes> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.base64)
            .map(Bytes::from)
            .map_err(|e| BridgeError::BadMessage(format!("invalid audio base64: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRecordingResponse {
    /// Request id of the session this result belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<EncodedAudio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RecordingError>,
}

impl StopRecordingResponse {
    pub fn failed(error: RecordingError) -> Self {
        Self { request_id: None, audio: None, error: Some(error) }
    }
}
