use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use subminer_core::error::Result;
use subminer_core::protocol::model::{Card, Profile, VideoTab};
use subminer_core::protocol::{Envelope, Message, SenderTag};
use subminer_core::{Capabilities, CapabilityGate};

use super::inbox::{ExtensionMessage, PlayerInbox};
use crate::channel::RequestChannel;
use crate::config::BridgeConfig;
use crate::context::ContextService;
use crate::dispatch::Dispatcher;
use crate::presence::{HeartbeatEmitter, HeartbeatOptions, PresenceDirectory};
use crate::subscribers::{Subscribers, Subscription};
use crate::transport::{Inbound, Route, Transport};

/// The player realm's connection to the browser extension.
///
/// Everything goes over the shared page window: the extension's content
/// script relays between the window and the extension runtime.
pub struct ExtensionLink {
    gate: RwLock<CapabilityGate>,
    extension_commands: HashMap<String, String>,
    side_panel: Arc<AtomicBool>,
    channel: Arc<RequestChannel>,
    service: Arc<ContextService>,
    directory: Arc<PresenceDirectory>,
    heartbeat: Arc<HeartbeatEmitter>,
    subscribers: Arc<Subscribers<ExtensionMessage>>,
}

impl ExtensionLink {
    /// Build the link and start listening. `version` is the extension
    /// version announced to the page, `None` when the extension is absent.
    pub fn new(
        version: Option<&str>,
        extension_commands: HashMap<String, String>,
        transport: Arc<dyn Transport>,
        inbound: mpsc::Receiver<Inbound>,
        config: &BridgeConfig,
    ) -> Arc<Self> {
        let instance_id = Uuid::new_v4().to_string();
        let channel = Arc::new(RequestChannel::new(
            transport,
            SenderTag::Player,
            instance_id,
            config.channel.request_timeout(),
        ));

        let side_panel = Arc::new(AtomicBool::new(false));
        let directory = PresenceDirectory::new();
        let heartbeat = Arc::new(HeartbeatEmitter::new(
            Arc::clone(&channel),
            Route::Window,
            Arc::clone(&directory),
            Arc::clone(&side_panel),
            config.heartbeat.interval(),
        ));
        let subscribers = Subscribers::new();

        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.register(Arc::new(PlayerInbox {
            directory: Arc::clone(&directory),
            heartbeat: Arc::clone(&heartbeat),
            subscribers: Arc::clone(&subscribers),
        }));

        let service = ContextService::new(Arc::clone(&channel), dispatcher, inbound);
        service.start();

        let gate = CapabilityGate::new(version);
        tracing::info!(
            instance = %channel.instance_id(),
            installed = gate.installed(),
            version = gate.version(),
            "extension link started"
        );

        Arc::new(Self {
            gate: RwLock::new(gate),
            extension_commands,
            side_panel,
            channel,
            service,
            directory,
            heartbeat,
            subscribers,
        })
    }

    pub fn instance_id(&self) -> &str {
        self.channel.instance_id()
    }

    pub fn installed(&self) -> bool {
        self.gate().installed()
    }

    pub fn version(&self) -> String {
        self.gate().version().to_string()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.gate().capabilities()
    }

    /// Re-gate on a version reported later by the extension. A running
    /// heartbeat keeps its options; restart it to apply the new gate.
    pub fn observe_version(&self, version: &str) {
        let mut gate = self.gate.write().unwrap_or_else(|p| p.into_inner());
        if gate.installed() && gate.version() == version {
            return;
        }
        gate.observe(version);
        tracing::info!(instance = %self.channel.instance_id(), version, "extension version observed");
    }

    fn gate(&self) -> RwLockReadGuard<'_, CapabilityGate> {
        self.gate.read().unwrap_or_else(|p| p.into_inner())
    }

    /// Keyboard shortcut bound to an extension command, if any.
    pub fn extension_command(&self, name: &str) -> Option<&str> {
        self.extension_commands.get(name).map(String::as_str)
    }

    pub fn side_panel(&self) -> bool {
        self.side_panel.load(Ordering::Relaxed)
    }

    pub fn set_side_panel(&self, side_panel: bool) {
        self.side_panel.store(side_panel, Ordering::Relaxed);
    }

    pub fn tabs(&self) -> Option<Vec<VideoTab>> {
        self.directory.tabs()
    }

    pub fn directory(&self) -> &Arc<PresenceDirectory> {
        &self.directory
    }

    pub fn start_heartbeat(&self, options: HeartbeatOptions) -> bool {
        let gate = self.gate().clone();
        self.heartbeat.start(&gate, options)
    }

    pub fn stop_heartbeat(&self) {
        self.heartbeat.stop();
    }

    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    pub async fn open_shortcuts(&self) -> Result<()> {
        self.post(&Message::OpenExtensionShortcuts).await
    }

    /// Tell other surfaces that settings changed. Addressed with our own id
    /// so the extension does not echo it back to us.
    pub async fn notify_settings_updated(&self) -> Result<()> {
        let envelope = self
            .channel
            .envelope(&Message::SettingsUpdated)?
            .with_instance(self.instance_id());
        self.channel.send(Route::Window, envelope).await
    }

    pub async fn toggle_side_panel(&self) -> Result<()> {
        self.post(&Message::ToggleSidePanel).await
    }

    pub async fn publish_card(&self, card: Card) -> Result<()> {
        self.post(&Message::PublishCard(card)).await
    }

    /// Fire-and-forget to the content script serving `src` in `tab_id`.
    pub async fn send_to_video_element(&self, message: &Value, tab_id: i64, src: &str) -> Result<()> {
        let envelope = Envelope::new(SenderTag::Player, message)?.with_tab(tab_id, src);
        self.channel.send(Route::Window, envelope).await
    }

    /// Correlated request to the content script serving `src` in `tab_id`.
    pub async fn request_video_element(&self, message: &Value, tab_id: i64, src: &str) -> Result<Value> {
        let envelope = Envelope::new(SenderTag::Player, message)?.with_tab(tab_id, src);
        self.channel.request(Route::Window, envelope).await
    }

    pub async fn get_settings(&self, keys_and_defaults: Map<String, Value>) -> Result<Map<String, Value>> {
        self.request(&Message::GetSettings { keys_and_defaults }).await
    }

    pub async fn set_settings(&self, settings: Map<String, Value>) -> Result<()> {
        self.request::<Value>(&Message::SetSettings { settings }).await?;
        self.notify_settings_updated().await
    }

    pub async fn active_settings_profile(&self) -> Result<Option<Profile>> {
        self.request(&Message::GetActiveProfile).await
    }

    pub async fn set_active_settings_profile(&self, name: Option<String>) -> Result<()> {
        self.request::<Value>(&Message::SetActiveProfile { name }).await?;
        self.notify_settings_updated().await
    }

    pub async fn settings_profiles(&self) -> Result<Vec<Profile>> {
        let profiles: Option<Vec<Profile>> = self.request(&Message::GetProfiles).await?;
        Ok(profiles.unwrap_or_default())
    }

    pub async fn add_settings_profile(&self, name: impl Into<String>) -> Result<()> {
        self.request::<Value>(&Message::AddProfile { name: name.into() }).await?;
        Ok(())
    }

    pub async fn remove_settings_profile(&self, name: impl Into<String>) -> Result<()> {
        self.request::<Value>(&Message::RemoveProfile { name: name.into() }).await?;
        Ok(())
    }

    /// Every extension message except `tabs`.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ExtensionMessage) + Send + Sync + 'static,
    {
        self.subscribers.add(callback)
    }

    /// Fires now with the known tabs (if any) and on every `tabs` broadcast.
    pub fn subscribe_tabs<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[VideoTab]) + Send + Sync + 'static,
    {
        self.directory.subscribe(move |snapshot| callback(&snapshot.tabs))
    }

    /// Stop listening and drop every subscriber. Heartbeats are stopped too.
    pub fn unbind(&self) {
        self.heartbeat.stop();
        self.service.stop();
        self.subscribers.clear();
        self.directory.clear_subscribers();
        tracing::info!(instance = %self.instance_id(), "extension link unbound");
    }

    async fn post(&self, message: &Message) -> Result<()> {
        let envelope = self.channel.envelope(message)?;
        self.channel.send(Route::Window, envelope).await
    }

    async fn request<T: serde::de::DeserializeOwned>(&self, message: &Message) -> Result<T> {
        let envelope = self.channel.envelope(message)?;
        self.channel.request_as(Route::Window, envelope).await
    }
}
