//! In-process transport hub.
//!
//! Each context connects with the route it listens on and gets a bounded
//! inbound queue. Posting fans out to every other endpoint on the route.
//! `Window` posts never fail (nobody listening is normal for a page);
//! `Runtime` and `Tab` posts fail when no receiver exists, like the browser's
//! "receiving end does not exist".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use subminer_core::error::{BridgeError, Result};
use subminer_core::protocol::Envelope;

use super::{Inbound, Route, Transport};
use crate::config::TransportSection;

const INBOUND_QUEUE: usize = 256;

#[derive(Clone)]
struct Endpoint {
    route: Route,
    listen_self: bool,
    tx: mpsc::Sender<Inbound>,
}

/// Registry of connected contexts.
pub struct LocalHub {
    endpoints: DashMap<u64, Endpoint>,
    seq: AtomicU64,
    delivery_timeout: Duration,
}

impl LocalHub {
    pub fn new(delivery_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            endpoints: DashMap::new(),
            seq: AtomicU64::new(1),
            delivery_timeout,
        })
    }

    pub fn from_config(cfg: &TransportSection) -> Arc<Self> {
        Self::new(cfg.delivery_timeout())
    }

    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    /// Connect a context listening on `route`. The returned port posts on
    /// behalf of the context; the receiver is its inbound queue.
    pub fn connect(self: &Arc<Self>, route: Route) -> (Arc<LocalPort>, mpsc::Receiver<Inbound>) {
        self.connect_inner(route, false)
    }

    /// Like `connect`, but the context also observes its own posts on its
    /// route (a window listener sees its own `postMessage`).
    pub fn connect_loopback(
        self: &Arc<Self>,
        route: Route,
    ) -> (Arc<LocalPort>, mpsc::Receiver<Inbound>) {
        self.connect_inner(route, true)
    }

    fn connect_inner(
        self: &Arc<Self>,
        route: Route,
        listen_self: bool,
    ) -> (Arc<LocalPort>, mpsc::Receiver<Inbound>) {
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        self.endpoints.insert(id, Endpoint { route, listen_self, tx });
        tracing::debug!(endpoint = id, ?route, "context connected");

        let port = Arc::new(LocalPort {
            hub: Arc::clone(self),
            id,
            route,
        });
        (port, rx)
    }

    pub fn disconnect(&self, id: u64) {
        if self.endpoints.remove(&id).is_some() {
            tracing::debug!(endpoint = id, "context disconnected");
        }
    }

    pub fn endpoint_count(&self, route: Route) -> usize {
        self.endpoints.iter().filter(|e| e.value().route == route).count()
    }

    /// Deliver concurrently to every receiver on `route`, bounded per receiver.
    async fn deliver(&self, from_id: u64, from: Route, route: Route, envelope: Envelope) -> Result<()> {
        let targets: Vec<(u64, mpsc::Sender<Inbound>)> = self
            .endpoints
            .iter()
            .filter(|e| {
                let ep = e.value();
                ep.route == route && (*e.key() != from_id || ep.listen_self)
            })
            .map(|e| (*e.key(), e.value().tx.clone()))
            .collect();

        if targets.is_empty() {
            return match route {
                Route::Window => Ok(()),
                _ => Err(BridgeError::Transport(format!(
                    "no receiving end for {route:?} (command from {})",
                    envelope.sender.as_str()
                ))),
            };
        }

        let wait = self.delivery_timeout;
        let mut futs = FuturesUnordered::new();
        for (id, tx) in targets {
            let inbound = Inbound { envelope: envelope.clone(), from };
            futs.push(async move {
                match timeout(wait, tx.send(inbound)).await {
                    Ok(Ok(())) => None,
                    Ok(Err(_)) => Some(id),
                    Err(_) => {
                        tracing::warn!(endpoint = id, "inbound queue full, envelope dropped");
                        None
                    }
                }
            });
        }

        let mut gone = Vec::new();
        while let Some(res) = futs.next().await {
            if let Some(id) = res {
                gone.push(id);
            }
        }
        for id in gone {
            // receiver dropped without disconnecting
            self.disconnect(id);
        }
        Ok(())
    }
}

/// A context's handle on the hub.
pub struct LocalPort {
    hub: Arc<LocalHub>,
    id: u64,
    route: Route,
}

impl LocalPort {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn disconnect(&self) {
        self.hub.disconnect(self.id);
    }
}

#[async_trait]
impl Transport for LocalPort {
    async fn post(&self, route: Route, envelope: Envelope) -> Result<()> {
        tracing::trace!(from = self.id, ?route, sender = envelope.sender.as_str(), "post");
        self.hub.deliver(self.id, self.route, route, envelope).await
    }
}
