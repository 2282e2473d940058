//! Shared fakes for the integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

use subminer_bridge::channel::RequestChannel;
use subminer_bridge::config::TransportSection;
use subminer_bridge::context::ContextService;
use subminer_bridge::dialog::{PlaybackHost, PostMinePlayback};
use subminer_bridge::dispatch::{Dispatcher, EnvelopeHandler};
use subminer_bridge::frame::{DocumentProvider, Surface, SurfaceHandle, SurfaceHost};
use subminer_bridge::recorder::{AudioCapture, CapturedAudio, MediaCapture, SurfaceManager};
use subminer_bridge::transport::{Inbound, LocalHub, LocalPort, Route, Transport};
use subminer_core::error::{BridgeError, Result};
use subminer_core::protocol::frame::{SavedDialogState, SubtitleRef};
use subminer_core::protocol::{Envelope, SenderTag};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn hub() -> Arc<LocalHub> {
    LocalHub::from_config(&TransportSection::default())
}

/// One wired context: port, channel, dispatcher and (not yet started) pump.
pub struct Ctx {
    pub port: Arc<LocalPort>,
    pub channel: Arc<RequestChannel>,
    pub dispatcher: Arc<Dispatcher>,
    pub service: Arc<ContextService>,
}

impl Ctx {
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.port.clone()
    }
}

pub fn context(hub: &Arc<LocalHub>, route: Route, sender: SenderTag, instance: &str) -> Ctx {
    let (port, rx) = hub.connect(route);
    let transport: Arc<dyn Transport> = port.clone();
    let channel = Arc::new(RequestChannel::new(
        transport,
        sender,
        instance,
        Duration::from_secs(5),
    ));
    let dispatcher = Arc::new(Dispatcher::new());
    let service = ContextService::new(channel.clone(), dispatcher.clone(), rx);
    Ctx {
        port,
        channel,
        dispatcher,
        service,
    }
}

/// Records every envelope of one sender tag and answers correlated ones
/// from a canned table (command -> response).
pub struct Responder {
    tag: SenderTag,
    reply_as: SenderTag,
    reply_on: Route,
    transport: Arc<dyn Transport>,
    answers: Mutex<Vec<(String, Value)>>,
    seen: Mutex<Vec<Envelope>>,
}

impl Responder {
    pub fn new(tag: SenderTag, reply_as: SenderTag, reply_on: Route, transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            tag,
            reply_as,
            reply_on,
            transport,
            answers: Mutex::new(Vec::new()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn answer(&self, command: &str, response: Value) {
        self.answers.lock().unwrap().push((command.to_string(), response));
    }

    pub fn seen(&self) -> Vec<Envelope> {
        self.seen.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.seen()
            .iter()
            .filter_map(|e| e.header().ok().map(|h| h.command))
            .collect()
    }
}

#[async_trait]
impl EnvelopeHandler for Responder {
    fn sender(&self) -> SenderTag {
        self.tag
    }

    async fn handle(&self, inbound: Inbound) -> Result<()> {
        let env = inbound.envelope;
        self.seen.lock().unwrap().push(env.clone());

        let header = env.header()?;
        let Some(message_id) = header.message_id else {
            return Ok(());
        };
        let answer = self
            .answers
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| *c == header.command)
            .map(|(_, v)| v.clone());
        if let Some(response) = answer {
            let reply = Envelope::response(self.reply_as, &header.command, &message_id, &response)?;
            self.transport.post(self.reply_on, reply).await?;
        }
        Ok(())
    }
}

/// Drain whatever is queued right now.
pub fn drain(rx: &mut mpsc::Receiver<Inbound>) -> Vec<Envelope> {
    let mut out = Vec::new();
    while let Ok(inbound) = rx.try_recv() {
        out.push(inbound.envelope);
    }
    out
}

pub fn command_of(env: &Envelope) -> String {
    env.header().unwrap().command
}

/// Poll `cond` until it holds (bounded).
pub async fn eventually<F: Fn() -> bool>(cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(cond(), "condition never became true");
}

// ---------------------------------------------------------------- recorder

pub struct FakeSurfaces {
    pub supported: bool,
    pub exists: AtomicBool,
    pub created: AtomicUsize,
}

impl FakeSurfaces {
    pub fn new(supported: bool) -> Arc<Self> {
        Arc::new(Self {
            supported,
            exists: AtomicBool::new(false),
            created: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SurfaceManager for FakeSurfaces {
    fn supports_offscreen(&self) -> bool {
        self.supported
    }

    async fn has_capture_surface(&self) -> Result<bool> {
        Ok(self.exists.load(Ordering::SeqCst))
    }

    async fn create_capture_surface(&self, document: &str, _justification: &str) -> Result<()> {
        assert_eq!(document, "offscreen-audio-recorder.html");
        self.created.fetch_add(1, Ordering::SeqCst);
        self.exists.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeMedia;

#[async_trait]
impl MediaCapture for FakeMedia {
    async fn media_stream_id(&self, tab_id: i64) -> Result<String> {
        Ok(format!("stream-{tab_id}"))
    }
}

pub struct FakeCapture {
    pub data: Bytes,
    pub mp3: bool,
    pub fail_begin: bool,
    pub begun: Mutex<Vec<Option<String>>>,
    pub ended: AtomicUsize,
}

impl FakeCapture {
    pub fn new(data: &'static [u8], mp3: bool) -> Arc<Self> {
        Arc::new(Self {
            data: Bytes::from_static(data),
            mp3,
            fail_begin: false,
            begun: Mutex::new(Vec::new()),
            ended: AtomicUsize::new(0),
        })
    }

    pub fn begun(&self) -> Vec<Option<String>> {
        self.begun.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioCapture for FakeCapture {
    async fn begin(&self, stream_id: Option<&str>) -> Result<()> {
        if self.fail_begin {
            return Err(BridgeError::Transport("permission denied".into()));
        }
        self.begun.lock().unwrap().push(stream_id.map(str::to_string));
        Ok(())
    }

    async fn end(&self, prefer_mp3: bool) -> Result<CapturedAudio> {
        self.ended.fetch_add(1, Ordering::SeqCst);
        let extension = if prefer_mp3 && self.mp3 { "mp3" } else { "webm" };
        Ok(CapturedAudio {
            data: self.data.clone(),
            extension: extension.into(),
        })
    }
}

// ------------------------------------------------------------------- frame

pub struct FakeSurface {
    pub document: String,
    pub posted: Mutex<Vec<Value>>,
    pub hidden: AtomicBool,
    pub destroyed: AtomicBool,
    to_host: mpsc::Sender<Value>,
}

impl FakeSurface {
    /// Message emitted by the surface towards the host.
    pub async fn emit(&self, message: Value) {
        self.to_host.send(message).await.unwrap();
    }

    pub fn commands(&self) -> Vec<String> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .map(|m| m["command"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn posted(&self) -> Vec<Value> {
        self.posted.lock().unwrap().clone()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl SurfaceHandle for FakeSurface {
    fn post(&self, message: Value) -> Result<()> {
        self.posted.lock().unwrap().push(message);
        Ok(())
    }

    fn set_hidden(&self, hidden: bool) {
        self.hidden.store(hidden, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

pub struct FakeSurfaceHost {
    pub auto_ready: bool,
    pub create_delay: Duration,
    created: Mutex<Vec<Arc<FakeSurface>>>,
}

impl FakeSurfaceHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            auto_ready: true,
            create_delay: Duration::ZERO,
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn silent() -> Arc<Self> {
        Arc::new(Self {
            auto_ready: false,
            create_delay: Duration::ZERO,
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            auto_ready: true,
            create_delay: delay,
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn last(&self) -> Arc<FakeSurface> {
        self.created.lock().unwrap().last().cloned().expect("no surface created")
    }
}

#[async_trait]
impl SurfaceHost for FakeSurfaceHost {
    async fn create(&self, document: String) -> Result<Surface> {
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        let (tx, rx) = mpsc::channel(64);
        let surface = Arc::new(FakeSurface {
            document,
            posted: Mutex::new(Vec::new()),
            hidden: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            to_host: tx.clone(),
        });
        if self.auto_ready {
            // some noise before the handshake
            tx.send(json!({"command": "loading"})).await.unwrap();
            tx.send(json!({"command": "ready"})).await.unwrap();
        }
        self.created.lock().unwrap().push(surface.clone());
        Ok(Surface {
            handle: surface,
            messages: rx,
        })
    }
}

pub struct FakeDocuments;

#[async_trait]
impl DocumentProvider for FakeDocuments {
    async fn document(&self, language: &str) -> Result<String> {
        Ok(format!("<!DOCTYPE html><html lang=\"{language}\"><body><div id=\"root\"></div></body></html>"))
    }
}

// ---------------------------------------------------------------- playback

pub struct FakePlayback {
    pub src: String,
    pub time: Mutex<f64>,
    pub was_playing: bool,
    pub policy: PostMinePlayback,
    pub log: Mutex<Vec<String>>,
    pub saved: Mutex<Vec<SavedDialogState>>,
    pub focus: broadcast::Sender<()>,
}

impl FakePlayback {
    pub fn new(policy: PostMinePlayback, was_playing: bool) -> Arc<Self> {
        let (focus, _) = broadcast::channel(8);
        Arc::new(Self {
            src: "https://video.example/v.mp4".into(),
            time: Mutex::new(12.5),
            was_playing,
            policy,
            log: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
            focus,
        })
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<SavedDialogState> {
        self.saved.lock().unwrap().clone()
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl PlaybackHost for FakePlayback {
    fn video_src(&self) -> String {
        self.src.clone()
    }

    fn current_time(&self) -> f64 {
        *self.time.lock().unwrap()
    }

    fn pause(&self) {
        self.push("pause".into());
    }

    fn play(&self) {
        self.push("play".into());
    }

    fn seek(&self, seconds: f64) {
        *self.time.lock().unwrap() = seconds;
        self.push(format!("seek:{seconds}"));
    }

    fn was_playing_before_mining(&self) -> bool {
        self.was_playing
    }

    fn post_mine_playback(&self) -> PostMinePlayback {
        self.policy
    }

    fn capture_focus(&self) {
        self.push("capture_focus".into());
    }

    fn restore_focus(&self) {
        self.push("restore_focus".into());
    }

    fn set_key_bindings_enabled(&self, enabled: bool) {
        self.push(format!("keys:{enabled}"));
    }

    fn set_overlays_suppressed(&self, suppressed: bool) {
        self.push(format!("overlays:{suppressed}"));
    }

    fn save_dialog_state(&self, state: SavedDialogState) {
        self.saved.lock().unwrap().push(state);
    }

    fn source(&self, subtitle: &SubtitleRef) -> String {
        format!("episode-01.srt @ {}", subtitle.start / 1000.0)
    }

    fn url(&self, _start_ms: f64, _end_ms: f64) -> Option<String> {
        None
    }

    async fn rerecord(&self, record_start: f64, record_end: f64, _state: SavedDialogState) {
        self.push(format!("rerecord:{record_start}-{record_end}"));
    }

    fn focus_events(&self) -> broadcast::Receiver<()> {
        self.focus.subscribe()
    }
}
