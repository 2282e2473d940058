use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Duration;

use subminer_core::error::Result;
use subminer_core::protocol::model::{StartRecordingResponse, StopRecordingResponse};
use subminer_core::protocol::{Envelope, Message, SenderTag};

use super::{millis, AudioRecorder, Requester};
use crate::channel::RequestChannel;
use crate::config::RecorderSection;
use crate::transport::Route;

/// Lifecycle of the singleton offscreen capture document.
#[async_trait]
pub trait SurfaceManager: Send + Sync {
    /// Whether this environment can host offscreen documents at all.
    fn supports_offscreen(&self) -> bool;
    async fn has_capture_surface(&self) -> Result<bool>;
    async fn create_capture_surface(&self, document: &str, justification: &str) -> Result<()>;
}

/// Tab capture primitive.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Stream id the offscreen document can open to capture `tab_id`.
    async fn media_stream_id(&self, tab_id: i64) -> Result<String>;
}

/// Records through the offscreen document.
pub struct OffscreenAudioRecorder {
    channel: Arc<RequestChannel>,
    surfaces: Arc<dyn SurfaceManager>,
    media: Arc<dyn MediaCapture>,
    document: String,
    justification: String,
}

impl OffscreenAudioRecorder {
    pub fn new(
        channel: Arc<RequestChannel>,
        surfaces: Arc<dyn SurfaceManager>,
        media: Arc<dyn MediaCapture>,
        config: &RecorderSection,
    ) -> Self {
        Self {
            channel,
            surfaces,
            media,
            document: config.offscreen_document.clone(),
            justification: config.justification.clone(),
        }
    }

    async fn ensure_surface(&self) -> Result<()> {
        if self.surfaces.has_capture_surface().await? {
            return Ok(());
        }
        tracing::debug!(document = %self.document, "creating offscreen capture surface");
        self.surfaces
            .create_capture_surface(&self.document, &self.justification)
            .await
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, message: &Message) -> Result<T> {
        let envelope = Envelope::new(SenderTag::ExtensionToOffscreenDocument, message)?;
        self.channel.request_as(Route::Runtime, envelope).await
    }
}

#[async_trait]
impl AudioRecorder for OffscreenAudioRecorder {
    async fn start(&self, request_id: &str, requester: &Requester) -> Result<StartRecordingResponse> {
        self.ensure_surface().await?;
        let stream_id = self.media.media_stream_id(requester.tab_id).await?;
        self.send(&Message::StartRecordingAudio {
            stream_id: Some(stream_id),
            request_id: request_id.to_string(),
        })
        .await
    }

    async fn start_with_timeout(
        &self,
        timeout: Duration,
        prefer_mp3: bool,
        request_id: &str,
        requester: &Requester,
    ) -> Result<StartRecordingResponse> {
        self.ensure_surface().await?;
        let stream_id = self.media.media_stream_id(requester.tab_id).await?;
        self.send(&Message::StartRecordingAudioWithTimeout {
            timeout: millis(timeout),
            prefer_mp3,
            stream_id: Some(stream_id),
            request_id: request_id.to_string(),
        })
        .await
    }

    async fn stop(&self, prefer_mp3: bool, requester: &Requester) -> Result<StopRecordingResponse> {
        // the singleton surface holds the buffer whoever started it
        tracing::trace!(tab_id = requester.tab_id, "stop addressed to offscreen surface");
        self.send(&Message::StopRecordingAudio { prefer_mp3 }).await
    }
}
