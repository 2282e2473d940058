use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

use subminer_core::error::Result;
use subminer_core::protocol::model::VideoTab;
use subminer_core::protocol::Message;
use subminer_core::CapabilityGate;

use super::directory::PresenceDirectory;
use crate::channel::RequestChannel;
use crate::transport::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartbeatOptions {
    /// True for video surfaces, false for management surfaces.
    pub from_video_player: bool,
    pub loaded_subtitles: bool,
}

/// Periodic liveness broadcaster. At most one timer per context: starting a
/// cycle aborts the previous one.
pub struct HeartbeatEmitter {
    channel: Arc<RequestChannel>,
    route: Route,
    directory: Arc<PresenceDirectory>,
    side_panel: Arc<AtomicBool>,
    interval: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    cycles: AtomicU64,
}

impl HeartbeatEmitter {
    pub fn new(
        channel: Arc<RequestChannel>,
        route: Route,
        directory: Arc<PresenceDirectory>,
        side_panel: Arc<AtomicBool>,
        interval: Duration,
    ) -> Self {
        Self {
            channel,
            route,
            directory,
            side_panel,
            interval,
            timer: Mutex::new(None),
            cycles: AtomicU64::new(0),
        }
    }

    /// Start a heartbeat cycle. Returns false when heartbeats are suppressed:
    /// the extension is not installed, or this is a video surface and the
    /// extension is too old to understand heartbeats from one.
    pub fn start(&self, gate: &CapabilityGate, options: HeartbeatOptions) -> bool {
        let mut timer = self.timer.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(prev) = timer.take() {
            prev.abort();
        }

        if !gate.installed() {
            return false;
        }
        if options.from_video_player && !gate.capabilities().supports_video_player_heartbeat {
            tracing::debug!(version = gate.version(), "video surface heartbeats suppressed for old extension");
            return false;
        }

        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let channel = Arc::clone(&self.channel);
        let directory = Arc::clone(&self.directory);
        let side_panel = Arc::clone(&self.side_panel);
        let route = self.route;
        let period = self.interval;

        *timer = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let received_tabs = if options.from_video_player {
                    Vec::new()
                } else {
                    directory.tabs().unwrap_or_default()
                };
                let message = Message::Heartbeat {
                    id: channel.instance_id().to_string(),
                    received_tabs,
                    video_player: options.from_video_player,
                    side_panel: side_panel.load(Ordering::Relaxed),
                    loaded_subtitles: options.loaded_subtitles,
                };
                if let Err(e) = post(&channel, route, &message).await {
                    tracing::warn!(cycle, error = %e, "heartbeat not delivered");
                }
            }
        }));
        true
    }

    pub fn stop(&self) {
        if let Some(prev) = self.timer.lock().unwrap_or_else(|p| p.into_inner()).take() {
            prev.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// One-shot reply to a `tabs` broadcast that requested acknowledgement.
    pub async fn ack(&self, received_tabs: Vec<VideoTab>) -> Result<()> {
        let message = Message::AckTabs {
            id: self.channel.instance_id().to_string(),
            received_tabs,
            side_panel: self.side_panel.load(Ordering::Relaxed),
        };
        post(&self.channel, self.route, &message).await
    }
}

impl Drop for HeartbeatEmitter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn post(channel: &RequestChannel, route: Route, message: &Message) -> Result<()> {
    let envelope = channel.envelope(message)?;
    channel.send(route, envelope).await
}
