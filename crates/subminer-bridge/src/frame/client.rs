use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use subminer_core::error::Result;
use subminer_core::protocol::FrameCommand;

use super::SurfaceHandle;
use crate::subscribers::{Subscribers, Subscription};

/// Messaging handle on one bound surface. Stable for the surface lifetime:
/// every `FrameBridge::client` call while bound returns the same `Arc`.
pub struct FrameClient {
    handle: Arc<dyn SurfaceHandle>,
    listeners: Arc<Subscribers<Value>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl FrameClient {
    pub(crate) fn start(handle: Arc<dyn SurfaceHandle>, mut messages: mpsc::Receiver<Value>) -> Arc<Self> {
        let listeners: Arc<Subscribers<Value>> = Subscribers::new();
        let sink = Arc::clone(&listeners);
        let pump = tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                sink.emit(&message);
            }
            tracing::debug!("surface message stream closed");
        });

        Arc::new(Self {
            handle,
            listeners,
            pump: Mutex::new(Some(pump)),
        })
    }

    /// Fire-and-forget into the surface.
    pub fn send_message(&self, command: &FrameCommand) -> Result<()> {
        self.handle.post(serde_json::to_value(command)?)
    }

    pub fn update_state(&self, state: Value) -> Result<()> {
        self.send_message(&FrameCommand::State { state })
    }

    /// Messages the surface emits, in order.
    pub fn on_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.listeners.add(callback)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn handle(&self) -> &Arc<dyn SurfaceHandle> {
        &self.handle
    }

    pub(crate) fn close(&self) {
        if let Some(pump) = self.pump.lock().unwrap_or_else(|p| p.into_inner()).take() {
            pump.abort();
        }
        self.listeners.clear();
        self.handle.destroy();
    }
}

impl Drop for FrameClient {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().unwrap_or_else(|p| p.into_inner()).take() {
            pump.abort();
        }
    }
}
