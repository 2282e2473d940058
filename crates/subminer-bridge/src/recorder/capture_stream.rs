use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Duration;

use subminer_core::error::Result;
use subminer_core::protocol::model::{StartRecordingResponse, StopRecordingResponse};
use subminer_core::protocol::{Envelope, Message, SenderTag};

use super::{millis, AudioRecorder, Requester};
use crate::channel::RequestChannel;
use crate::transport::Route;

/// Records inside the content script next to the video. `src` picks the
/// frame when a tab embeds several.
pub struct CaptureStreamAudioRecorder {
    channel: Arc<RequestChannel>,
}

impl CaptureStreamAudioRecorder {
    pub fn new(channel: Arc<RequestChannel>) -> Self {
        Self { channel }
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, message: &Message, requester: &Requester) -> Result<T> {
        let envelope = Envelope::new(SenderTag::ExtensionToVideo, message)?.with_src(requester.src.clone());
        self.channel
            .request_as(Route::Tab(requester.tab_id), envelope)
            .await
    }
}

#[async_trait]
impl AudioRecorder for CaptureStreamAudioRecorder {
    async fn start(&self, request_id: &str, requester: &Requester) -> Result<StartRecordingResponse> {
        let message = Message::StartRecordingAudio {
            stream_id: None,
            request_id: request_id.to_string(),
        };
        self.send(&message, requester).await
    }

    async fn start_with_timeout(
        &self,
        timeout: Duration,
        prefer_mp3: bool,
        request_id: &str,
        requester: &Requester,
    ) -> Result<StartRecordingResponse> {
        let message = Message::StartRecordingAudioWithTimeout {
            timeout: millis(timeout),
            prefer_mp3,
            stream_id: None,
            request_id: request_id.to_string(),
        };
        self.send(&message, requester).await
    }

    async fn stop(&self, prefer_mp3: bool, requester: &Requester) -> Result<StopRecordingResponse> {
        self.send(&Message::StopRecordingAudio { prefer_mp3 }, requester).await
    }
}
