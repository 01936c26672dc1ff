#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use leasehold_backend::domain::{CreateEventRequest, EventResponse, Role};
use leasehold_backend::lifecycle::{Actor, TemplateCatalog};
use leasehold_backend::services::{
    EventService, ManualClock, Notifier, RecordingNotificationSink,
};
use leasehold_backend::store::MemoryEventStore;

pub struct Harness {
    pub service: EventService,
    pub store: Arc<MemoryEventStore>,
    pub sink: Arc<RecordingNotificationSink>,
    pub clock: ManualClock,
    pub operator: Actor,
    pub resident: Actor,
    pub maintenance: Actor,
    pub prospect: Actor,
    pub admin: Actor,
}

/// 2026-06-02 09:00 UTC
pub fn nine_am() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 2, 9, 0, 0).unwrap()
}

impl Harness {
    pub fn new() -> Self {
        let clock = ManualClock::new(nine_am());
        let store = Arc::new(MemoryEventStore::new());
        let sink = Arc::new(RecordingNotificationSink::new());
        let service = EventService::new(
            store.clone(),
            Arc::new(TemplateCatalog::builtin()),
            Notifier::new(sink.clone()),
        )
        .with_clock(Arc::new(clock.clone()));

        Self {
            service,
            store,
            sink,
            clock,
            operator: Actor::new(Uuid::new_v4(), Role::Operator),
            resident: Actor::new(Uuid::new_v4(), Role::Resident),
            maintenance: Actor::new(Uuid::new_v4(), Role::Maintenance),
            prospect: Actor::new(Uuid::new_v4(), Role::Prospect),
            admin: Actor::new(Uuid::new_v4(), Role::Admin),
        }
    }

    pub fn request(&self, event_type: &str, scheduled_at: DateTime<Utc>) -> CreateEventRequest {
        CreateEventRequest {
            event_type: event_type.to_string(),
            title: None,
            description: None,
            scheduled_at,
            duration_minutes: None,
            priority: None,
            assigned_users: vec![
                self.resident.user_id,
                self.maintenance.user_id,
                self.prospect.user_id,
            ],
            property_id: None,
            unit_id: None,
            metadata: None,
        }
    }

    /// Operator creates an event of `event_type` at `scheduled_at`
    pub async fn create(&self, event_type: &str, scheduled_at: DateTime<Utc>) -> EventResponse {
        self.service
            .create(self.operator, &self.request(event_type, scheduled_at))
            .await
            .unwrap()
    }
}

pub fn task_id(event: &EventResponse, key: &str) -> Uuid {
    event
        .tasks
        .iter()
        .find(|t| t.key == key)
        .unwrap_or_else(|| panic!("no task {key}"))
        .id
}

pub fn task<'a>(
    event: &'a EventResponse,
    key: &str,
) -> &'a leasehold_backend::domain::TaskResponse {
    event.tasks.iter().find(|t| t.key == key).unwrap()
}
