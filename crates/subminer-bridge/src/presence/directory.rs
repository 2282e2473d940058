use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use subminer_core::protocol::model::{PlayerInstance, VideoTab};

use crate::subscribers::{Subscribers, Subscription};

/// The canonical peer set as last broadcast by the extension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerSnapshot {
    pub tabs: Vec<VideoTab>,
    pub players: Vec<PlayerInstance>,
}

/// Latest known peers. Replaced wholesale on every `tabs` broadcast, never
/// merged, so readers never see a partial set.
pub struct PresenceDirectory {
    current: watch::Sender<Option<Arc<PeerSnapshot>>>,
    subscribers: Arc<Subscribers<Arc<PeerSnapshot>>>,
}

impl PresenceDirectory {
    pub fn new() -> Arc<Self> {
        let (current, _) = watch::channel(None);
        Arc::new(Self {
            current,
            subscribers: Subscribers::new(),
        })
    }

    pub fn replace(&self, snapshot: PeerSnapshot) -> Arc<PeerSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.send_replace(Some(Arc::clone(&snapshot)));
        tracing::debug!(
            tabs = snapshot.tabs.len(),
            players = snapshot.players.len(),
            "peer directory replaced"
        );
        self.subscribers.emit(&snapshot);
        snapshot
    }

    pub fn current(&self) -> Option<Arc<PeerSnapshot>> {
        self.current.borrow().clone()
    }

    /// Known tabs, `None` until the first broadcast.
    pub fn tabs(&self) -> Option<Vec<VideoTab>> {
        self.current.borrow().as_ref().map(|s| s.tabs.clone())
    }

    /// Callback fires now with the current set (if known) and again on every
    /// replacement. A snapshot is delivered at most once even when a
    /// `replace` races the subscription.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PeerSnapshot) + Send + Sync + 'static,
    {
        let deliver = Arc::new(Deliver {
            last: Mutex::new(None),
            callback,
        });
        let registered = Arc::clone(&deliver);
        let subscription = self.subscribers.add(move |s: &Arc<PeerSnapshot>| registered.offer(s));

        if let Some(current) = self.current() {
            deliver.offer(&current);
        }
        subscription
    }

    /// Async view of the directory for consumers that prefer awaiting.
    pub fn watch(&self) -> watch::Receiver<Option<Arc<PeerSnapshot>>> {
        self.current.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn clear_subscribers(&self) {
        self.subscribers.clear();
    }
}

/// One subscriber's callback plus the last snapshot it saw.
struct Deliver<F> {
    last: Mutex<Option<Arc<PeerSnapshot>>>,
    callback: F,
}

impl<F: Fn(&PeerSnapshot)> Deliver<F> {
    fn offer(&self, snapshot: &Arc<PeerSnapshot>) {
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if last.as_ref().is_some_and(|seen| Arc::ptr_eq(seen, snapshot)) {
            return;
        }
        *last = Some(Arc::clone(snapshot));
        (self.callback)(snapshot);
    }
}
