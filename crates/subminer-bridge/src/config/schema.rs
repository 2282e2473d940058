use serde::Deserialize;
use subminer_core::error::{BridgeError, Result};

use tokio::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub version: u32,

    #[serde(default)]
    pub channel: ChannelSection,

    #[serde(default)]
    pub heartbeat: HeartbeatSection,

    #[serde(default)]
    pub recorder: RecorderSection,

    #[serde(default)]
    pub frame: FrameSection,

    #[serde(default)]
    pub transport: TransportSection,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            channel: ChannelSection::default(),
            heartbeat: HeartbeatSection::default(),
            recorder: RecorderSection::default(),
            frame: FrameSection::default(),
            transport: TransportSection::default(),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(BridgeError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        check_range("channel.request_timeout_ms", self.channel.request_timeout_ms, 100, 60000)?;
        check_range("heartbeat.interval_ms", self.heartbeat.interval_ms, 100, 60000)?;
        check_range("frame.ready_timeout_ms", self.frame.ready_timeout_ms, 100, 60000)?;
        check_range("transport.delivery_timeout_ms", self.transport.delivery_timeout_ms, 10, 60000)?;

        if self.recorder.offscreen_document.trim().is_empty() {
            return Err(BridgeError::Config(
                "recorder.offscreen_document must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn check_range(name: &str, v: u64, min: u64, max: u64) -> Result<()> {
    if !(min..=max).contains(&v) {
        return Err(BridgeError::Config(format!(
            "{name} must be between {min} and {max}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSection {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ChannelSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatSection {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub interval_ms: u64,
}

impl Default for HeartbeatSection {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl HeartbeatSection {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Which capture strategy records audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureStrategy {
    /// Offscreen capture when the environment supports it, else in-page.
    #[default]
    Auto,
    Offscreen,
    CaptureStream,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecorderSection {
    #[serde(default)]
    pub strategy: CaptureStrategy,

    #[serde(default = "default_offscreen_document")]
    pub offscreen_document: String,

    #[serde(default = "default_justification")]
    pub justification: String,
}

impl Default for RecorderSection {
    fn default() -> Self {
        Self {
            strategy: CaptureStrategy::default(),
            offscreen_document: default_offscreen_document(),
            justification: default_justification(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameSection {
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

impl Default for FrameSection {
    fn default() -> Self {
        Self {
            ready_timeout_ms: default_ready_timeout_ms(),
        }
    }
}

impl FrameSection {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportSection {
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

impl TransportSection {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_heartbeat_interval_ms() -> u64 {
    1000
}
fn default_ready_timeout_ms() -> u64 {
    5000
}
fn default_delivery_timeout_ms() -> u64 {
    1500
}
fn default_offscreen_document() -> String {
    "offscreen-audio-recorder.html".into()
}
fn default_justification() -> String {
    "Audio recording".into()
}
