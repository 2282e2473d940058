use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use subminer_core::error::{BridgeError, Result};
use subminer_core::protocol::{FetchOptions, FrameCommand};

use super::client::FrameClient;
use super::{DocumentProvider, Surface, SurfaceHost};

/// Parameters a bound surface was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FrameParams {
    document: String,
    fetch_options: Option<FetchOptions>,
    language: String,
}

struct Bound {
    params: FrameParams,
    client: Arc<FrameClient>,
}

/// Lifecycle of the dialog frame: `unbound -> binding -> bound(hidden) <->
/// bound(shown)`; `unbind` goes back to `unbound` from anywhere.
pub struct FrameBridge {
    host: Arc<dyn SurfaceHost>,
    documents: Arc<dyn DocumentProvider>,
    ready_timeout: Duration,

    fetch_options: Mutex<Option<FetchOptions>>,
    language: Mutex<String>,

    // serialises binds; held across surface creation
    binding: tokio::sync::Mutex<()>,
    bound: Mutex<Option<Bound>>,
    hidden: AtomicBool,
    created: AtomicU64,
}

impl FrameBridge {
    pub fn new(
        host: Arc<dyn SurfaceHost>,
        documents: Arc<dyn DocumentProvider>,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            host,
            documents,
            ready_timeout,
            fetch_options: Mutex::new(None),
            language: Mutex::new("en".into()),
            binding: tokio::sync::Mutex::new(()),
            bound: Mutex::new(None),
            hidden: AtomicBool::new(true),
            created: AtomicU64::new(0),
        }
    }

    pub fn set_fetch_options(&self, options: Option<FetchOptions>) {
        *lock(&self.fetch_options) = options;
    }

    pub fn set_language(&self, language: impl Into<String>) {
        *lock(&self.language) = language.into();
    }

    /// Make sure a surface with the current parameters exists. Resolves
    /// `true` when a new surface (and client) was created.
    pub async fn bind(&self) -> Result<bool> {
        let _binding = self.binding.lock().await;

        let fetch_options = lock(&self.fetch_options).clone();
        let language = lock(&self.language).clone();
        let document = self.documents.document(&language).await?;
        let params = FrameParams {
            document,
            fetch_options,
            language,
        };

        let unchanged = lock(&self.bound).as_ref().is_some_and(|b| b.params == params);
        if unchanged {
            return Ok(false);
        }
        let prev = lock(&self.bound).take();
        if let Some(prev) = prev {
            tracing::debug!("frame parameters changed, recreating surface");
            prev.client.close();
        }

        let Surface { handle, mut messages } = self.host.create(params.document.clone()).await?;
        handle.set_hidden(true);
        self.hidden.store(true, Ordering::Relaxed);

        match timeout(self.ready_timeout, wait_ready(&mut messages)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                handle.destroy();
                return Err(e);
            }
            Err(_) => {
                handle.destroy();
                tracing::warn!(timeout_ms = self.ready_timeout.as_millis() as u64, "frame never became ready");
                return Err(BridgeError::Timeout {
                    command: "ready".into(),
                    message_id: String::new(),
                });
            }
        }

        let configure = FrameCommand::Configure {
            fetch_options: params.fetch_options.clone(),
            language: params.language.clone(),
        };
        if let Err(e) = handle.post(serde_json::to_value(&configure)?) {
            handle.destroy();
            return Err(e);
        }

        let client = FrameClient::start(handle, messages);
        *lock(&self.bound) = Some(Bound { params, client });
        let n = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(surfaces_created = n, "frame bound");
        Ok(true)
    }

    /// Client of the bound surface, binding first if needed.
    pub async fn client(&self) -> Result<Arc<FrameClient>> {
        if let Some(client) = self.current_client() {
            return Ok(client);
        }
        self.bind().await?;
        self.current_client()
            .ok_or_else(|| BridgeError::Internal("frame unbound while binding".into()))
    }

    /// Client of the bound surface, without binding.
    pub fn current_client(&self) -> Option<Arc<FrameClient>> {
        lock(&self.bound).as_ref().map(|b| Arc::clone(&b.client))
    }

    pub fn bound(&self) -> bool {
        lock(&self.bound).is_some()
    }

    pub fn hidden(&self) -> bool {
        self.hidden.load(Ordering::Relaxed)
    }

    pub fn showing(&self) -> bool {
        self.bound() && !self.hidden()
    }

    pub fn show(&self) {
        self.set_hidden(false);
    }

    pub fn hide(&self) {
        self.set_hidden(true);
    }

    /// Number of surfaces created over the bridge's lifetime.
    pub fn surfaces_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Destroy the surface and its listeners. The next `bind` starts over.
    pub fn unbind(&self) {
        if let Some(prev) = lock(&self.bound).take() {
            prev.client.close();
            tracing::debug!("frame unbound");
        }
        self.hidden.store(true, Ordering::Relaxed);
    }

    fn set_hidden(&self, hidden: bool) {
        let bound = lock(&self.bound);
        let Some(b) = bound.as_ref() else {
            return;
        };
        b.client.handle().set_hidden(hidden);
        self.hidden.store(hidden, Ordering::Relaxed);
    }
}

async fn wait_ready(messages: &mut mpsc::Receiver<Value>) -> Result<()> {
    while let Some(message) = messages.recv().await {
        match message.get("command").and_then(Value::as_str) {
            Some("ready") => return Ok(()),
            other => tracing::trace!(command = ?other, "message before ready ignored"),
        }
    }
    Err(BridgeError::Transport("surface closed before ready".into()))
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
