//! Closed set of commands exchanged between contexts.
//!
//! The correlation id (`messageId`) is not part of these variants: the
//! request channel merges it into the body when a message is sent as a
//! correlated request, and the decoder ignores it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::model::{Card, EncodedAudio, PlayerInstance, RecordingError, VideoTab};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all_fields = "camelCase")]
pub enum Message {
    /// Presence broadcast from the extension: the canonical peer set.
    #[serde(rename = "tabs")]
    Tabs {
        tabs: Vec<VideoTab>,
        #[serde(default)]
        asbplayers: Vec<PlayerInstance>,
        #[serde(default)]
        ack_requested: bool,
    },
    /// Acknowledges a `tabs` broadcast that asked for it.
    #[serde(rename = "ackTabs")]
    AckTabs {
        id: String,
        received_tabs: Vec<VideoTab>,
        side_panel: bool,
    },
    /// Periodic liveness announcement from a player context.
    #[serde(rename = "heartbeat")]
    Heartbeat {
        id: String,
        #[serde(default)]
        received_tabs: Vec<VideoTab>,
        video_player: bool,
        side_panel: bool,
        loaded_subtitles: bool,
    },
    #[serde(rename = "open-extension-shortcuts")]
    OpenExtensionShortcuts,
    #[serde(rename = "settings-updated")]
    SettingsUpdated,
    #[serde(rename = "toggle-side-panel")]
    ToggleSidePanel,
    #[serde(rename = "publish-card")]
    PublishCard(Card),
    #[serde(rename = "get-settings")]
    GetSettings { keys_and_defaults: Map<String, Value> },
    #[serde(rename = "set-settings")]
    SetSettings { settings: Map<String, Value> },
    #[serde(rename = "get-active-profile")]
    GetActiveProfile,
    #[serde(rename = "set-active-profile")]
    SetActiveProfile {
        #[serde(default)]
        name: Option<String>,
    },
    #[serde(rename = "get-profiles")]
    GetProfiles,
    #[serde(rename = "add-profile")]
    AddProfile { name: String },
    #[serde(rename = "remove-profile")]
    RemoveProfile { name: String },
    /// Begin buffering audio. `stream_id` is set only for offscreen capture.
    #[serde(rename = "start-recording-audio")]
    StartRecordingAudio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        request_id: String,
    },
    /// Begin buffering audio and auto-stop after `timeout` milliseconds.
    #[serde(rename = "start-recording-audio-with-timeout")]
    StartRecordingAudioWithTimeout {
        timeout: u64,
        prefer_mp3: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        request_id: String,
    },
    #[serde(rename = "stop-recording-audio")]
    StopRecordingAudio { prefer_mp3: bool },
    /// Out-of-band push emitted when a timeout-bounded recording auto-stops.
    #[serde(rename = "recording-finished")]
    RecordingFinished {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<EncodedAudio>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RecordingError>,
    },
    #[serde(rename = "open-asbplayer-settings")]
    OpenSettings,
    #[serde(rename = "copy-to-clipboard")]
    CopyToClipboard { data_url: String },
}

impl Message {
    /// Wire command string of this message.
    pub fn command(&self) -> &'static str {
        match self {
            Message::Tabs { .. } => "tabs",
            Message::AckTabs { .. } => "ackTabs",
            Message::Heartbeat { .. } => "heartbeat",
            Message::OpenExtensionShortcuts => "open-extension-shortcuts",
            Message::SettingsUpdated => "settings-updated",
            Message::ToggleSidePanel => "toggle-side-panel",
            Message::PublishCard(_) => "publish-card",
            Message::GetSettings { .. } => "get-settings",
            Message::SetSettings { .. } => "set-settings",
            Message::GetActiveProfile => "get-active-profile",
            Message::SetActiveProfile { .. } => "set-active-profile",
            Message::GetProfiles => "get-profiles",
            Message::AddProfile { .. } => "add-profile",
            Message::RemoveProfile { .. } => "remove-profile",
            Message::StartRecordingAudio { .. } => "start-recording-audio",
            Message::StartRecordingAudioWithTimeout { .. } => "start-recording-audio-with-timeout",
            Message::StopRecordingAudio { .. } => "stop-recording-audio",
            Message::RecordingFinished { .. } => "recording-finished",
            Message::OpenSettings => "open-asbplayer-settings",
            Message::CopyToClipboard { .. } => "copy-to-clipboard",
        }
    }
}
