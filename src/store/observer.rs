//! Store change observers
//!
//! `subscribe(callback) -> Subscription`; dropping the subscription (or
//! calling [`Subscription::unsubscribe`]) detaches the callback. Callbacks
//! run after the lock is released, so they may call back into the store.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};

use crate::domain::UniversalEvent;

/// A committed change to the event store
#[derive(Debug, Clone)]
pub enum StoreChange {
    Inserted(UniversalEvent),
    Updated(UniversalEvent),
}

impl StoreChange {
    pub fn event(&self) -> &UniversalEvent {
        match self {
            Self::Inserted(event) | Self::Updated(event) => event,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Inserted(_) => "inserted",
            Self::Updated(_) => "updated",
        }
    }
}

pub type ObserverCallback = Arc<dyn Fn(&StoreChange) + Send + Sync>;

#[derive(Default)]
struct ObserverSet {
    next_id: u64,
    callbacks: Vec<(u64, ObserverCallback)>,
}

#[derive(Clone, Default)]
pub struct StoreObservers {
    inner: Arc<RwLock<ObserverSet>>,
}

impl StoreObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StoreChange) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(callback))
    }

    pub fn subscribe_arc(&self, callback: ObserverCallback) -> Subscription {
        let mut set = self.inner.write();
        let id = set.next_id;
        set.next_id += 1;
        set.callbacks.push((id, callback));
        Subscription {
            id,
            observers: Arc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, change: &StoreChange) {
        let callbacks: Vec<ObserverCallback> = self
            .inner
            .read()
            .callbacks
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(change);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by `subscribe`
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    observers: Weak<RwLock<ObserverSet>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    /// Keep the callback registered for the lifetime of the store
    pub fn detach(mut self) {
        self.observers = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.observers.upgrade() {
            inner.write().callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
