use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use subminer_core::error::{BridgeError, Result};
use subminer_core::protocol::model::{
    EncodedAudio, RecordingError, StartRecordingResponse, StopRecordingResponse,
};
use subminer_core::protocol::{Envelope, Message, SenderTag};

use crate::dispatch::EnvelopeHandler;
use crate::transport::{Inbound, Route, Transport};

/// Finished recording as produced by the capture backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAudio {
    pub data: Bytes,
    /// `mp3` when encoded as requested, else the backend's native container.
    pub extension: String,
}

/// Capture backend of a capturing context.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Open the source and start buffering. `stream_id` is set for
    /// offscreen capture; in-page capture records the local media element.
    async fn begin(&self, stream_id: Option<&str>) -> Result<()>;

    /// Stop buffering and hand back the recording. Backends that cannot
    /// encode mp3 ignore `prefer_mp3`.
    async fn end(&self, prefer_mp3: bool) -> Result<CapturedAudio>;
}

struct Session {
    request_id: String,
    auto_stop: Option<JoinHandle<()>>,
    /// Terminal result of a session that already stopped on its own.
    finished: Option<StopRecordingResponse>,
}

type SessionSlot = Arc<Mutex<Option<Session>>>;

/// Answering side of the recording commands. Holds at most one session.
pub struct CaptureHost {
    inbound: SenderTag,
    reply: SenderTag,
    /// Frame served by an in-page host; envelopes for other frames are ignored.
    src: Option<String>,
    capture: Arc<dyn AudioCapture>,
    transport: Arc<dyn Transport>,
    session: SessionSlot,
}

impl CaptureHost {
    /// Host for the offscreen capture document.
    pub fn offscreen(transport: Arc<dyn Transport>, capture: Arc<dyn AudioCapture>) -> Arc<Self> {
        Arc::new(Self {
            inbound: SenderTag::ExtensionToOffscreenDocument,
            reply: SenderTag::OffscreenDocument,
            src: None,
            capture,
            transport,
            session: Arc::new(Mutex::new(None)),
        })
    }

    /// Host for the content script serving the video at `src`.
    pub fn in_page(
        transport: Arc<dyn Transport>,
        capture: Arc<dyn AudioCapture>,
        src: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            inbound: SenderTag::ExtensionToVideo,
            reply: SenderTag::Video,
            src: Some(src.into()),
            capture,
            transport,
            session: Arc::new(Mutex::new(None)),
        })
    }

    pub async fn recording(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| s.finished.is_none())
    }

    async fn start(
        &self,
        stream_id: Option<String>,
        request_id: String,
        auto_stop: Option<(Duration, bool)>,
    ) -> StartRecordingResponse {
        let mut slot = self.session.lock().await;

        if let Some(prev) = slot.take() {
            tracing::warn!(previous = %prev.request_id, next = %request_id, "recording session replaced");
            if let Some(timer) = prev.auto_stop {
                timer.abort();
            }
            if prev.finished.is_none() {
                if let Err(e) = self.capture.end(false).await {
                    tracing::debug!(error = %e, "discarding replaced recording failed");
                }
            }
        }

        if let Err(e) = self.capture.begin(stream_id.as_deref()).await {
            tracing::warn!(%request_id, error = %e, "capture could not start");
            return StartRecordingResponse::failed(RecordingError::NoPermission);
        }

        let timer = auto_stop.map(|(after, prefer_mp3)| {
            tokio::spawn(auto_stop_after(
                after,
                prefer_mp3,
                request_id.clone(),
                Arc::clone(&self.session),
                Arc::clone(&self.capture),
                Arc::clone(&self.transport),
                self.reply,
                self.src.clone(),
            ))
        });

        tracing::debug!(%request_id, timed = timer.is_some(), "recording started");
        *slot = Some(Session {
            request_id,
            auto_stop: timer,
            finished: None,
        });
        StartRecordingResponse::started()
    }

    async fn stop(&self, prefer_mp3: bool) -> StopRecordingResponse {
        let Some(session) = self.session.lock().await.take() else {
            return StopRecordingResponse::failed(RecordingError::NotRecording);
        };

        if let Some(timer) = session.auto_stop {
            timer.abort();
        }
        if let Some(done) = session.finished {
            tracing::debug!(request_id = %session.request_id, "returning buffered recording");
            return done;
        }
        finish(self.capture.as_ref(), &session.request_id, prefer_mp3).await
    }

    async fn reply(&self, command: &str, message_id: &str, response: &impl serde::Serialize) -> Result<()> {
        let mut envelope = Envelope::response(self.reply, command, message_id, response)?;
        if let Some(src) = &self.src {
            envelope = envelope.with_src(src.clone());
        }
        self.transport.post(Route::Runtime, envelope).await
    }
}

#[async_trait]
impl EnvelopeHandler for CaptureHost {
    fn sender(&self) -> SenderTag {
        self.inbound
    }

    async fn handle(&self, inbound: Inbound) -> Result<()> {
        let env = inbound.envelope;
        if let Some(own) = &self.src {
            if env.src.as_deref() != Some(own.as_str()) {
                tracing::trace!(src = ?env.src, "recording command for another frame");
                return Ok(());
            }
        }

        let header = env.header()?;
        let message: Message = env.decode()?;

        let response = match message {
            Message::StartRecordingAudio { stream_id, request_id } => {
                serde_json::to_value(self.start(stream_id, request_id, None).await)?
            }
            Message::StartRecordingAudioWithTimeout { timeout, prefer_mp3, stream_id, request_id } => {
                let armed = Some((Duration::from_millis(timeout), prefer_mp3));
                serde_json::to_value(self.start(stream_id, request_id, armed).await)?
            }
            Message::StopRecordingAudio { prefer_mp3 } => serde_json::to_value(self.stop(prefer_mp3).await)?,
            other => {
                return Err(BridgeError::UnknownCommand(format!(
                    "{} is not a recording command",
                    other.command()
                )))
            }
        };

        match header.message_id {
            Some(id) => self.reply(&header.command, &id, &response).await,
            None => Ok(()),
        }
    }
}

async fn finish(capture: &dyn AudioCapture, request_id: &str, prefer_mp3: bool) -> StopRecordingResponse {
    match capture.end(prefer_mp3).await {
        Ok(audio) => {
            if prefer_mp3 && audio.extension != "mp3" {
                tracing::debug!(%request_id, extension = %audio.extension, "mp3 unavailable, sending native encoding");
            }
            StopRecordingResponse {
                request_id: Some(request_id.to_string()),
                audio: Some(EncodedAudio::encode(&audio.data, audio.extension)),
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(%request_id, error = %e, "capture failed");
            StopRecordingResponse {
                request_id: Some(request_id.to_string()),
                audio: None,
                error: Some(RecordingError::CaptureFailed),
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn auto_stop_after(
    after: Duration,
    prefer_mp3: bool,
    request_id: String,
    session: SessionSlot,
    capture: Arc<dyn AudioCapture>,
    transport: Arc<dyn Transport>,
    reply: SenderTag,
    src: Option<String>,
) {
    tokio::time::sleep(after).await;

    let result = {
        let mut slot = session.lock().await;
        let Some(current) = slot.as_mut() else {
            return;
        };
        if current.request_id != request_id || current.finished.is_some() {
            return;
        }
        let result = finish(capture.as_ref(), &request_id, prefer_mp3).await;
        current.finished = Some(result.clone());
        current.auto_stop = None;
        result
    };
    tracing::debug!(%request_id, "recording stopped on timeout");

    let pushed = Message::RecordingFinished {
        request_id,
        audio: result.audio,
        error: result.error,
    };
    let envelope = Envelope::new(reply, &pushed).map(|e| match src {
        Some(src) => e.with_src(src),
        None => e,
    });
    let sent = match envelope {
        Ok(envelope) => transport.post(Route::Runtime, envelope).await,
        Err(e) => Err(e),
    };
    if let Err(e) = sent {
        tracing::warn!(error = %e, "recording-finished not delivered");
    }
}
