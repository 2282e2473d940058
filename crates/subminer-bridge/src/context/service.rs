use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use subminer_core::error::ErrorKind;

use crate::channel::RequestChannel;
use crate::dispatch::Dispatcher;
use crate::transport::Inbound;

/// The one listener of a context: drains its inbound queue in order,
/// correlates responses first, then dispatches by sender tag.
pub struct ContextService {
    channel: Arc<RequestChannel>,
    dispatcher: Arc<Dispatcher>,
    inbound: Mutex<Option<mpsc::Receiver<Inbound>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ContextService {
    pub fn new(
        channel: Arc<RequestChannel>,
        dispatcher: Arc<Dispatcher>,
        inbound: mpsc::Receiver<Inbound>,
    ) -> Arc<Self> {
        Arc::new(Self {
            channel,
            dispatcher,
            inbound: Mutex::new(Some(inbound)),
            task: Mutex::new(None),
        })
    }

    pub fn channel(&self) -> &Arc<RequestChannel> {
        &self.channel
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Spawn the pump. A service starts once; later calls are ignored.
    pub fn start(&self) {
        let Some(rx) = lock(&self.inbound).take() else {
            tracing::warn!(instance = %self.channel.instance_id(), "context already started");
            return;
        };

        let channel = Arc::clone(&self.channel);
        let dispatcher = Arc::clone(&self.dispatcher);
        let handle = tokio::spawn(pump(channel, dispatcher, rx));
        *lock(&self.task) = Some(handle);
    }

    /// Stop listening and drop every handler and pending request.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
        self.dispatcher.clear();
        self.channel.pending().clear();
        tracing::debug!(instance = %self.channel.instance_id(), "context stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task).as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ContextService {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }
}

async fn pump(channel: Arc<RequestChannel>, dispatcher: Arc<Dispatcher>, mut rx: mpsc::Receiver<Inbound>) {
    let instance = channel.instance_id().to_string();
    tracing::debug!(%instance, "context pump started");

    while let Some(inbound) = rx.recv().await {
        let env = &inbound.envelope;

        // peer discovery broadcasts are never instance-filtered
        let discovery = env.header().map(|h| h.command == "tabs").unwrap_or(false);
        if !discovery && !channel.accepts(env) {
            tracing::trace!(%instance, "envelope addressed to another instance");
            continue;
        }

        let correlated = channel.resolve(env);

        if !dispatcher.handles(env.sender) {
            tracing::trace!(%instance, sender = env.sender.as_str(), "no handler for sender");
            continue;
        }

        let sender = env.sender;
        if let Err(e) = dispatcher.dispatch(inbound).await {
            match e.kind() {
                // a reply may not decode as a command of its own
                _ if correlated => tracing::debug!(%instance, error = %e, "correlated reply not dispatched"),
                ErrorKind::UnknownCommand | ErrorKind::BadMessage => {
                    tracing::warn!(%instance, sender = sender.as_str(), error = %e, "inbound message rejected")
                }
                _ => tracing::error!(%instance, sender = sender.as_str(), error = %e, "handler failed"),
            }
        }
    }

    tracing::debug!(%instance, "context pump ended");
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
