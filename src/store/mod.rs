//! Event persistence boundary
//!
//! The hosted backend is consumed as `fetch(filter) -> rows`,
//! `insert(row) -> row`, `update(id, patch) -> row`. No multi-row
//! transactions are assumed; concurrent updates to one row resolve
//! last-write-wins.

pub mod memory;
pub mod observer;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Cancellation, EventFilter, EventStatus, EventTask, FollowUp, UniversalEvent};

pub use memory::MemoryEventStore;
pub use observer::{ObserverCallback, StoreChange, StoreObservers, Subscription};
pub use postgres::PgEventStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event {0} not found")]
    NotFound(Uuid),

    #[error("event {0} already exists")]
    Conflict(Uuid),

    #[error("malformed stored event: {0}")]
    Malformed(String),

    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Mutable columns of a stored event
#[derive(Debug, Clone, PartialEq)]
pub struct EventPatch {
    pub status: EventStatus,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub tasks: Vec<EventTask>,
    pub follow_ups: Vec<FollowUp>,
    pub cancellation: Option<Cancellation>,
    pub rescheduled_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl EventPatch {
    pub fn from_event(event: &UniversalEvent) -> Self {
        Self {
            status: event.status,
            scheduled_at: event.scheduled_at,
            duration_minutes: event.duration_minutes,
            tasks: event.tasks.clone(),
            follow_ups: event.follow_ups.clone(),
            cancellation: event.cancellation.clone(),
            rescheduled_count: event.rescheduled_count,
            updated_at: event.updated_at,
        }
    }

    pub fn apply_to(&self, event: &mut UniversalEvent) {
        event.status = self.status;
        event.scheduled_at = self.scheduled_at;
        event.duration_minutes = self.duration_minutes;
        event.tasks = self.tasks.clone();
        event.follow_ups = self.follow_ups.clone();
        event.cancellation = self.cancellation.clone();
        event.rescheduled_count = self.rescheduled_count;
        event.updated_at = self.updated_at;
    }
}

/// An event read for modification
#[derive(Debug, Clone)]
pub struct LoadedEvent {
    pub event: UniversalEvent,
    /// Stored task or follow-up entries left out because they failed to decode
    pub dropped_entries: usize,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    fn observers(&self) -> &StoreObservers;

    async fn fetch(&self, filter: &EventFilter) -> StoreResult<Vec<UniversalEvent>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<UniversalEvent>>;

    /// Authoritative read ahead of a write. Backends that can lose entries
    /// while decoding report how many were dropped.
    async fn get_for_update(&self, id: Uuid) -> StoreResult<Option<LoadedEvent>> {
        Ok(self.get(id).await?.map(|event| LoadedEvent {
            event,
            dropped_entries: 0,
        }))
    }

    async fn insert(&self, event: &UniversalEvent) -> StoreResult<UniversalEvent>;

    async fn update(&self, id: Uuid, patch: &EventPatch) -> StoreResult<UniversalEvent>;

    async fn health_check(&self) -> bool {
        true
    }

    /// Observe committed inserts and updates
    fn subscribe(&self, callback: ObserverCallback) -> Subscription {
        self.observers().subscribe_arc(callback)
    }
}
