//! Callback registries with removal by identity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Set of callbacks keyed by subscription id.
pub struct Subscribers<T> {
    callbacks: DashMap<u64, Callback<T>>,
    seq: AtomicU64,
}

impl<T: 'static> Subscribers<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            callbacks: DashMap::new(),
            seq: AtomicU64::new(1),
        })
    }

    pub fn add<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        self.callbacks.insert(id, Arc::new(callback));

        let weak: Weak<Self> = Arc::downgrade(self);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(subs) = weak.upgrade() {
                    subs.callbacks.remove(&id);
                }
            })),
        }
    }

    /// Invoke every callback. The set is snapshotted first so a callback may
    /// subscribe or unsubscribe without deadlocking.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self.callbacks.iter().map(|e| Arc::clone(e.value())).collect();
        for cb in snapshot {
            cb(value);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn clear(&self) {
        self.callbacks.clear();
    }
}

/// Handle returned by every `subscribe`/`on_message`. Dropping it keeps the
/// callback registered; call `unsubscribe` to remove exactly this callback.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
