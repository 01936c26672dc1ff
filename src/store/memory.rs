//! In-memory event store
//!
//! Used for local development and tests. Writes can be made to fail to
//! exercise backend-failure handling.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::{EventPatch, EventStore, StoreChange, StoreError, StoreObservers, StoreResult};
use crate::domain::{EventFilter, UniversalEvent};

#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<Uuid, UniversalEvent>>,
    observers: StoreObservers,
    fail_writes: AtomicBool,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert/update fail with `Unavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    fn observers(&self) -> &StoreObservers {
        &self.observers
    }

    async fn fetch(&self, filter: &EventFilter) -> StoreResult<Vec<UniversalEvent>> {
        let mut events: Vec<UniversalEvent> = self
            .events
            .read()
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<UniversalEvent>> {
        Ok(self.events.read().get(&id).cloned())
    }

    async fn insert(&self, event: &UniversalEvent) -> StoreResult<UniversalEvent> {
        self.check_writable()?;
        {
            let mut events = self.events.write();
            if events.contains_key(&event.id) {
                return Err(StoreError::Conflict(event.id));
            }
            events.insert(event.id, event.clone());
        }
        self.observers.publish(&StoreChange::Inserted(event.clone()));
        Ok(event.clone())
    }

    async fn update(&self, id: Uuid, patch: &EventPatch) -> StoreResult<UniversalEvent> {
        self.check_writable()?;
        let updated = {
            let mut events = self.events.write();
            let event = events.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            patch.apply_to(event);
            event.clone()
        };
        self.observers.publish(&StoreChange::Updated(updated.clone()));
        Ok(updated)
    }
}
