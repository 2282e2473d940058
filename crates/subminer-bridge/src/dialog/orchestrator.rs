use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use subminer_core::error::{BridgeError, Result};
use subminer_core::protocol::frame::{SavedDialogState, SubtitleRef};
use subminer_core::protocol::{BridgeMessage, Envelope, FetchOptions, FrameCommand, Message, SenderTag};

use super::{PlaybackHost, PostMinePlayback};
use crate::channel::RequestChannel;
use crate::frame::{FrameBridge, FrameClient};
use crate::settings::SettingsStore;
use crate::subscribers::Subscription;
use crate::transport::Route;

/// Content of a freshly opened dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogRequest {
    pub subtitle: SubtitleRef,
    /// Everything else the dialog displays (surrounding subtitles, image,
    /// audio, definition, custom field values...), passed through as is.
    pub fields: Map<String, Value>,
}

/// Listeners attached once per bound surface.
struct Listeners {
    messages: Option<Subscription>,
    events: JoinHandle<()>,
    focus: JoinHandle<()>,
}

impl Drop for Listeners {
    fn drop(&mut self) {
        if let Some(sub) = self.messages.take() {
            sub.unsubscribe();
        }
        self.events.abort();
        self.focus.abort();
    }
}

/// What the message task needs to close the dialog and relay commands.
#[derive(Clone)]
struct Relay {
    frame: Arc<FrameBridge>,
    host: Arc<dyn PlaybackHost>,
    channel: Arc<RequestChannel>,
}

/// Opens the mining dialog over the host page and reacts to how it closes.
pub struct MiningDialog {
    frame: Arc<FrameBridge>,
    host: Arc<dyn PlaybackHost>,
    settings: Arc<dyn SettingsStore>,
    channel: Arc<RequestChannel>,
    anki_settings: Mutex<Option<Value>>,
    listeners: Mutex<Option<Listeners>>,
}

impl MiningDialog {
    pub fn new(
        frame: Arc<FrameBridge>,
        host: Arc<dyn PlaybackHost>,
        settings: Arc<dyn SettingsStore>,
        channel: Arc<RequestChannel>,
    ) -> Self {
        Self {
            frame,
            host,
            settings,
            channel,
            anki_settings: Mutex::new(None),
            listeners: Mutex::new(None),
        }
    }

    pub fn anki_settings(&self) -> Option<Value> {
        lock(&self.anki_settings).clone()
    }

    /// Replace the Anki settings, pushing them to a bound surface.
    pub fn set_anki_settings(&self, value: Option<Value>) -> Result<()> {
        *lock(&self.anki_settings) = value.clone();
        match (value, self.frame.current_client()) {
            (Some(value), Some(client)) => client.send_message(&FrameCommand::AnkiSettings { value }),
            _ => Ok(()),
        }
    }

    pub fn showing(&self) -> bool {
        self.frame.showing()
    }

    pub async fn show(&self, request: DialogRequest) -> Result<()> {
        let anki = self.require_anki_settings("show")?;
        self.prepare_show();
        let shown = self.open_initial(anki, request).await;
        self.restore_on_error(shown)
    }

    async fn open_initial(&self, anki: Value, request: DialogRequest) -> Result<()> {
        let client = self.client(&anki).await?;
        let theme = self.settings.get_single("themeType").await?;

        let DialogRequest { subtitle, mut fields } = request;
        fields.insert("type".into(), json!("initial"));
        fields.insert("open".into(), json!(true));
        fields.insert("canRerecord".into(), json!(true));
        fields.insert("settingsProvider".into(), anki);
        fields.insert("source".into(), json!(self.host.source(&subtitle)));
        fields.insert("url".into(), json!(self.host.url(subtitle.start, subtitle.end)));
        fields.insert("subtitle".into(), serde_json::to_value(&subtitle)?);
        fields.insert("themeType".into(), theme.unwrap_or(Value::Null));
        fields.insert(
            "dialogRequestedTimestamp".into(),
            json!(self.host.current_time() * 1000.0),
        );

        client.update_state(Value::Object(fields))?;
        self.frame.show();
        Ok(())
    }

    pub async fn show_after_rerecord(&self, ui_state: SavedDialogState) -> Result<()> {
        self.resume(ui_state, true, "show after rerecord").await
    }

    pub async fn show_after_retaking_screenshot(&self, ui_state: SavedDialogState) -> Result<()> {
        self.resume(ui_state, false, "show after retaking screenshot").await
    }

    /// Ask the dialog to rewind to its subtitle.
    pub async fn request_rewind(&self) -> Result<()> {
        let anki = self.require_anki_settings("rewind")?;
        let client = self.client(&anki).await?;
        self.frame.show();
        client.send_message(&FrameCommand::Rewind)
    }

    /// Destroy the surface and drop every listener.
    pub fn unbind(&self) {
        self.frame.unbind();
        lock(&self.listeners).take();
    }

    async fn resume(&self, ui_state: SavedDialogState, stamp: bool, what: &str) -> Result<()> {
        let anki = self.require_anki_settings(what)?;
        self.prepare_show();
        let shown = self.open_resumed(anki, ui_state, stamp).await;
        self.restore_on_error(shown)
    }

    async fn open_resumed(&self, anki: Value, ui_state: SavedDialogState, stamp: bool) -> Result<()> {
        let client = self.client(&anki).await?;
        let theme = self.settings.get_single("themeType").await?;

        let mut state = match serde_json::to_value(&ui_state)? {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        state.insert("type".into(), json!("resume"));
        state.insert("open".into(), json!(true));
        state.insert("canRerecord".into(), json!(true));
        state.insert("settingsProvider".into(), anki);
        state.insert("themeType".into(), theme.unwrap_or(Value::Null));
        if stamp {
            state.insert(
                "dialogRequestedTimestamp".into(),
                json!(self.host.current_time() * 1000.0),
            );
        }

        client.update_state(Value::Object(state))?;
        self.frame.show();
        Ok(())
    }

    fn require_anki_settings(&self, what: &str) -> Result<Value> {
        self.anki_settings()
            .ok_or_else(|| BridgeError::Precondition(format!("unable to {what}: anki settings are missing")))
    }

    fn prepare_show(&self) {
        self.host.pause();
        self.host.capture_focus();
        self.host.set_key_bindings_enabled(false);
        self.host.set_overlays_suppressed(true);
    }

    /// A dialog that failed to open gives the page back its key bindings,
    /// overlays and focus.
    fn restore_on_error(&self, shown: Result<()>) -> Result<()> {
        if let Err(e) = &shown {
            tracing::warn!(error = %e, "dialog failed to open");
            close(&Relay {
                frame: Arc::clone(&self.frame),
                host: Arc::clone(&self.host),
                channel: Arc::clone(&self.channel),
            });
        }
        shown
    }

    async fn client(&self, anki: &Value) -> Result<Arc<FrameClient>> {
        let allowed_fetch_url = anki
            .get("ankiConnectUrl")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.frame.set_fetch_options(Some(FetchOptions {
            video_src: self.host.video_src(),
            allowed_fetch_url,
        }));

        let language = self
            .settings
            .get_single("language")
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "en".into());
        self.frame.set_language(language);

        let new_client = self.frame.bind().await?;
        let client = self.frame.client().await?;
        if new_client {
            self.attach(&client);
        }
        Ok(client)
    }

    fn attach(&self, client: &Arc<FrameClient>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let messages = client.on_message(move |m| {
            // receiver only goes away on unbind
            let _ = tx.send(m.clone());
        });

        let relay = Relay {
            frame: Arc::clone(&self.frame),
            host: Arc::clone(&self.host),
            channel: Arc::clone(&self.channel),
        };
        let events = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                on_bridge_message(&relay, message).await;
            }
        });

        let mut focus_events = self.host.focus_events();
        let frame = Arc::clone(&self.frame);
        let focus_client = Arc::clone(client);
        let focus = tokio::spawn(async move {
            loop {
                match focus_events.recv().await {
                    Ok(()) => {
                        if !frame.showing() {
                            continue;
                        }
                        // hosts that steal focus when hiding their controls
                        if let Err(e) = focus_client.send_message(&FrameCommand::Focus) {
                            tracing::debug!(error = %e, "refocus not delivered");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        *lock(&self.listeners) = Some(Listeners {
            messages: Some(messages),
            events,
            focus,
        });
        tracing::debug!("dialog listeners attached");
    }
}

async fn on_bridge_message(relay: &Relay, value: Value) {
    match BridgeMessage::decode(&value) {
        Ok(BridgeMessage::Ready) => tracing::trace!("late ready from surface"),
        Ok(BridgeMessage::OpenSettings) => forward(relay, &Message::OpenSettings).await,
        Ok(BridgeMessage::CopyToClipboard { data_url }) => {
            forward(relay, &Message::CopyToClipboard { data_url }).await
        }
        Ok(BridgeMessage::Resume { ui_state, card_exported }) => {
            close(relay);
            let host = &relay.host;
            let requested = ui_state.dialog_requested_timestamp;
            host.save_dialog_state(ui_state);

            if card_exported && requested != 0.0 {
                let seek_to = requested / 1000.0;
                if host.current_time() != seek_to {
                    host.seek(seek_to);
                }
            }

            match host.post_mine_playback() {
                PostMinePlayback::Remember => {
                    if host.was_playing_before_mining() {
                        host.play();
                    }
                }
                PostMinePlayback::Play => host.play(),
                PostMinePlayback::Pause => {}
            }
        }
        Ok(BridgeMessage::Rewind { ui_state }) => {
            close(relay);
            let start = ui_state.subtitle.start;
            relay.host.save_dialog_state(ui_state);
            relay.host.pause();
            relay.host.seek(start / 1000.0);
        }
        Ok(BridgeMessage::Rerecord { record_start, record_end, ui_state }) => {
            close(relay);
            relay.host.rerecord(record_start, record_end, ui_state).await;
        }
        Err(e) => {
            close(relay);
            tracing::error!(error = %e, "unknown message received from bridge");
        }
    }
}

/// Undo `prepare_show`.
fn close(relay: &Relay) {
    relay.host.set_key_bindings_enabled(true);
    relay.host.set_overlays_suppressed(false);
    relay.frame.hide();
    relay.host.restore_focus();
}

/// Pass-through commands go to the background; the dialog stays open.
async fn forward(relay: &Relay, message: &Message) {
    let sent = match Envelope::new(SenderTag::Video, message) {
        Ok(envelope) => {
            let envelope = envelope.with_src(relay.host.video_src());
            relay.channel.send(Route::Runtime, envelope).await
        }
        Err(e) => Err(e),
    };
    if let Err(e) = sent {
        tracing::warn!(command = message.command(), error = %e, "relay to background failed");
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
