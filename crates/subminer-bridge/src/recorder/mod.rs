//! Audio recording delegates.
//!
//! The background context never records itself. It asks a capturing context
//! to do so: either the singleton offscreen document (fed a tab capture
//! stream id) or the content script embedded next to the video. Both speak
//! the same three correlated commands; `CaptureHost` is the answering side.

mod capture_stream;
mod host;
mod offscreen;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Duration;

use subminer_core::error::Result;
use subminer_core::protocol::model::{StartRecordingResponse, StopRecordingResponse};

use crate::channel::RequestChannel;
use crate::config::{CaptureStrategy, RecorderSection};

pub use capture_stream::CaptureStreamAudioRecorder;
pub use host::{AudioCapture, CaptureHost, CapturedAudio};
pub use offscreen::{MediaCapture, OffscreenAudioRecorder, SurfaceManager};

/// The page/frame a recording command is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requester {
    pub tab_id: i64,
    pub src: String,
}

impl Requester {
    pub fn new(tab_id: i64, src: impl Into<String>) -> Self {
        Self { tab_id, src: src.into() }
    }
}

#[async_trait]
pub trait AudioRecorder: Send + Sync {
    async fn start(&self, request_id: &str, requester: &Requester) -> Result<StartRecordingResponse>;

    /// Like `start`, but the capturing context stops on its own after
    /// `timeout` and buffers the result for a later `stop`.
    async fn start_with_timeout(
        &self,
        timeout: Duration,
        prefer_mp3: bool,
        request_id: &str,
        requester: &Requester,
    ) -> Result<StartRecordingResponse>;

    async fn stop(&self, prefer_mp3: bool, requester: &Requester) -> Result<StopRecordingResponse>;
}

/// Pick the recorder for this environment.
pub fn select_recorder(
    config: &RecorderSection,
    channel: Arc<RequestChannel>,
    surfaces: Arc<dyn SurfaceManager>,
    media: Arc<dyn MediaCapture>,
) -> Arc<dyn AudioRecorder> {
    let offscreen = match config.strategy {
        CaptureStrategy::Offscreen => true,
        CaptureStrategy::CaptureStream => false,
        CaptureStrategy::Auto => surfaces.supports_offscreen(),
    };
    tracing::debug!(strategy = ?config.strategy, offscreen, "audio recorder selected");

    if offscreen {
        Arc::new(OffscreenAudioRecorder::new(channel, surfaces, media, config))
    } else {
        Arc::new(CaptureStreamAudioRecorder::new(channel))
    }
}

/// Wire form of a recording timeout, saturating at `u64::MAX`.
pub(crate) fn millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
