//! Capability gate: maps the cooperating extension's advertised version to a
//! fixed set of feature flags.
//!
//! Every flag is `installed && version >= threshold`. When no version was
//! observed (`installed == false`) every flag is false, whatever the version
//! string says. Flags are derived state; re-evaluate whenever a new version
//! is observed.

use semver::Version;
use serde::Serialize;

/// Browser family of the current context. Only Firefox changes a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserFamily {
    #[default]
    Chromium,
    Firefox,
}

/// Version thresholds, one per flag.
mod thresholds {
    pub const PAUSE_ON_HOVER: (u64, u64, u64) = (1, 4, 0);
    pub const SUBTITLES_WIDTH_SETTING: (u64, u64, u64) = (1, 4, 0);
    pub const ORDERABLE_ANKI_FIELDS: (u64, u64, u64) = (1, 3, 0);
    pub const TRACK_SPECIFIC_SETTINGS: (u64, u64, u64) = (1, 3, 0);
    pub const SETTINGS_PROFILES: (u64, u64, u64) = (1, 3, 0);
    pub const STREAMING_VIDEO_OVERLAY: (u64, u64, u64) = (1, 1, 0);
    pub const WEB_SOCKET_CLIENT: (u64, u64, u64) = (1, 1, 0);
    pub const SIDE_PANEL: (u64, u64, u64) = (1, 0, 0);
    pub const APP_INTEGRATION: (u64, u64, u64) = (1, 0, 0);
    pub const VIDEO_PLAYER_MINING_COMMANDS: (u64, u64, u64) = (1, 0, 0);
    pub const PLAYBACK_RATE_MESSAGE: (u64, u64, u64) = (0, 24, 0);
    pub const OFFSET_MESSAGE: (u64, u64, u64) = (0, 23, 0);
    /// Exclusive lower bound: heartbeats from video surfaces need a newer peer.
    pub const VIDEO_PLAYER_HEARTBEAT_AFTER: (u64, u64, u64) = (0, 23, 0);
}

/// Fixed set of capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub supports_pause_on_hover: bool,
    pub supports_subtitles_width_setting: bool,
    pub supports_orderable_anki_fields: bool,
    pub supports_track_specific_settings: bool,
    pub supports_settings_profiles: bool,
    pub supports_streaming_video_overlay: bool,
    pub supports_web_socket_client: bool,
    pub supports_side_panel: bool,
    pub supports_app_integration: bool,
    pub supports_video_player_mining_commands: bool,
    pub supports_playback_rate_message: bool,
    pub supports_offset_message: bool,
    pub supports_video_player_heartbeat: bool,
}

impl Capabilities {
    /// Evaluate flags for a Chromium-family browser.
    pub fn evaluate(installed: bool, version: &str) -> Self {
        Self::evaluate_for(installed, version, BrowserFamily::Chromium)
    }

    /// Evaluate flags for a specific browser family.
    pub fn evaluate_for(installed: bool, version: &str, browser: BrowserFamily) -> Self {
        if !installed {
            return Self::default();
        }

        let Some(v) = parse_version(version) else {
            tracing::warn!(%version, "unparsable extension version, all capabilities disabled");
            return Self::default();
        };

        let gte = |t: (u64, u64, u64)| v >= Version::new(t.0, t.1, t.2);
        let gt = |t: (u64, u64, u64)| v > Version::new(t.0, t.1, t.2);

        use thresholds::*;
        Self {
            supports_pause_on_hover: gte(PAUSE_ON_HOVER),
            supports_subtitles_width_setting: gte(SUBTITLES_WIDTH_SETTING),
            supports_orderable_anki_fields: gte(ORDERABLE_ANKI_FIELDS),
            supports_track_specific_settings: gte(TRACK_SPECIFIC_SETTINGS),
            supports_settings_profiles: gte(SETTINGS_PROFILES),
            supports_streaming_video_overlay: gte(STREAMING_VIDEO_OVERLAY),
            supports_web_socket_client: gte(WEB_SOCKET_CLIENT),
            supports_side_panel: browser != BrowserFamily::Firefox && gte(SIDE_PANEL),
            supports_app_integration: gte(APP_INTEGRATION),
            supports_video_player_mining_commands: gte(VIDEO_PLAYER_MINING_COMMANDS),
            supports_playback_rate_message: gte(PLAYBACK_RATE_MESSAGE),
            supports_offset_message: gte(OFFSET_MESSAGE),
            supports_video_player_heartbeat: gt(VIDEO_PLAYER_HEARTBEAT_AFTER),
        }
    }
}

/// Version as observed from a peer. `installed` is true only if a version
/// string was actually seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityGate {
    installed: bool,
    version: String,
    browser: BrowserFamily,
}

impl CapabilityGate {
    pub fn new(version: Option<&str>) -> Self {
        Self {
            installed: version.is_some(),
            version: version.unwrap_or_default().to_string(),
            browser: BrowserFamily::default(),
        }
    }

    pub fn with_browser(mut self, browser: BrowserFamily) -> Self {
        self.browser = browser;
        self
    }

    pub fn installed(&self) -> bool {
        self.installed
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Record a newly observed version (e.g. on first peer contact).
    pub fn observe(&mut self, version: &str) {
        self.installed = true;
        self.version = version.to_string();
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::evaluate_for(self.installed, &self.version, self.browser)
    }
}

/// Parse a version, padding a missing minor/patch with zeros ("1.4" -> 1.4.0).
fn parse_version(s: &str) -> Option<Version> {
    let s = s.trim().trim_start_matches('v');
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }

    let (core, rest) = match s.find(['-', '+']) {
        Some(i) => s.split_at(i),
        None => (s, ""),
    };
    let parts = core.split('.').count();
    let padded = match parts {
        1 => format!("{core}.0.0{rest}"),
        2 => format!("{core}.0{rest}"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}
