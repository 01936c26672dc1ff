//! Event service
//!
//! Orchestrates the lifecycle: load the event from the store, apply a pure
//! lifecycle operation to an owned copy, persist the patch, then invalidate
//! the cache and notify. A failed write leaves the stored event untouched.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use super::cache::{keys, RedisCache};
use super::clock::{Clock, SystemClock};
use super::notifications::Notifier;
use crate::api::pagination::PaginationParams;
use crate::domain::{
    Capability, CreateEventRequest, EventFilter, EventResponse, EventStatus, EventTask,
    EventTemplate, FollowUp, RescheduleEventRequest, TaskActionResponse, TaskCompletionStamp,
    UniversalEvent,
};
use crate::lifecycle::{
    self, event_view, seal_event, stamps_for_event, Actor, DayBoundary, LifecycleError,
    TemplateCatalog,
};
use crate::store::{EventPatch, EventStore, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("event {0} not found")]
    EventNotFound(Uuid),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub struct EventService {
    store: Arc<dyn EventStore>,
    catalog: Arc<TemplateCatalog>,
    clock: Arc<dyn Clock>,
    reference_clock: Arc<dyn Clock>,
    boundary: DayBoundary,
    notifier: Notifier,
    cache: Option<RedisCache>,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>, catalog: Arc<TemplateCatalog>, notifier: Notifier) -> Self {
        Self {
            store,
            catalog,
            clock: Arc::new(SystemClock),
            reference_clock: Arc::new(SystemClock),
            boundary: DayBoundary::utc(),
            notifier,
            cache: None,
        }
    }

    /// Use one clock for both mutations and reads
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.reference_clock = Arc::clone(&clock);
        self.clock = clock;
        self
    }

    /// Clock used by read paths for overdue and day-lock evaluation
    pub fn with_reference_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.reference_clock = clock;
        self
    }

    pub fn with_day_boundary(mut self, boundary: DayBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_cache(mut self, cache: RedisCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn day_boundary(&self) -> DayBoundary {
        self.boundary
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    pub fn templates(&self) -> &[EventTemplate] {
        self.catalog.list()
    }

    pub fn template(&self, template_id: &str) -> ServiceResult<&EventTemplate> {
        Ok(self.catalog.get(template_id)?)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get(&self, actor: Actor, event_id: Uuid) -> ServiceResult<EventResponse> {
        let event = self.load_visible(actor, event_id).await?;
        Ok(event_view(&event, self.reference_clock.now(), self.boundary))
    }

    /// Events visible to `actor`, one page at a time, ordered by schedule
    pub async fn list(
        &self,
        actor: Actor,
        filter: &EventFilter,
        page: &PaginationParams,
    ) -> ServiceResult<(Vec<EventResponse>, u64)> {
        let now = self.reference_clock.now();
        let events = self.visible_events(actor, filter, now).await?;
        let total = events.len() as u64;
        let data = events
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|event| event_view(event, now, self.boundary))
            .collect();
        Ok((data, total))
    }

    pub async fn event_stamps(
        &self,
        actor: Actor,
        event_id: Uuid,
    ) -> ServiceResult<Vec<TaskCompletionStamp>> {
        let event = self.load_visible(actor, event_id).await?;
        let today = self.boundary.date_of(self.reference_clock.now());
        Ok(stamps_for_event(&event, today))
    }

    /// Stamps created on `date` (default: today) across visible events
    pub async fn stamps_on(
        &self,
        actor: Actor,
        date: Option<NaiveDate>,
    ) -> ServiceResult<Vec<TaskCompletionStamp>> {
        let now = self.reference_clock.now();
        let today = self.boundary.date_of(now);
        let date = date.unwrap_or(today);

        let events = self
            .visible_events(actor, &EventFilter::default(), now)
            .await?;
        let mut stamps: Vec<TaskCompletionStamp> = events
            .iter()
            .flat_map(|event| stamps_for_event(event, today))
            .filter(|stamp| stamp.created_date == date)
            .collect();
        stamps.sort_by_key(|s| s.completed_at);
        Ok(stamps)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    #[instrument(skip(self, request), fields(user_id = %actor.user_id, role = %actor.role, event_type = %request.event_type))]
    pub async fn create(
        &self,
        actor: Actor,
        request: &CreateEventRequest,
    ) -> ServiceResult<EventResponse> {
        let now = self.clock.now();
        let event = lifecycle::create_event(&self.catalog, request, actor, now)?;
        let stored = self.store.insert(&event).await.map_err(log_store_error)?;

        tracing::info!(event_id = %stored.id, tasks = stored.tasks.len(), "Event created");
        self.notifier.event_scheduled(&stored, actor.user_id).await;
        Ok(event_view(&stored, now, self.boundary))
    }

    pub async fn reschedule(
        &self,
        actor: Actor,
        event_id: Uuid,
        request: &RescheduleEventRequest,
    ) -> ServiceResult<EventResponse> {
        let (event, previous, now) = self
            .mutate(actor, event_id, |event, now| {
                lifecycle::reschedule(event, request, actor, now)
            })
            .await?;

        tracing::info!(
            event_id = %event.id,
            role = %actor.role,
            from = %previous,
            to = %event.scheduled_at,
            rescheduled_count = event.rescheduled_count,
            "Event rescheduled"
        );
        self.notifier.event_rescheduled(&event, actor.user_id).await;
        Ok(event_view(&event, now, self.boundary))
    }

    pub async fn cancel(
        &self,
        actor: Actor,
        event_id: Uuid,
        reason: Option<String>,
    ) -> ServiceResult<EventResponse> {
        let (event, (), now) = self
            .mutate(actor, event_id, |event, now| {
                lifecycle::cancel(event, reason, actor, now)
            })
            .await?;

        tracing::info!(event_id = %event.id, role = %actor.role, "Event cancelled");
        self.notifier.event_cancelled(&event, actor.user_id).await;
        Ok(event_view(&event, now, self.boundary))
    }

    pub async fn add_follow_up(
        &self,
        actor: Actor,
        event_id: Uuid,
        note: String,
    ) -> ServiceResult<FollowUp> {
        let (event, follow_up, _) = self
            .mutate(actor, event_id, |event, now| {
                lifecycle::add_follow_up(event, note, actor, now)
            })
            .await?;

        tracing::info!(event_id = %event.id, follow_up_id = %follow_up.id, "Follow-up added");
        Ok(follow_up)
    }

    pub async fn start_task(
        &self,
        actor: Actor,
        event_id: Uuid,
        task_id: Uuid,
    ) -> ServiceResult<TaskActionResponse> {
        let (event, (), now) = self
            .mutate(actor, event_id, |event, now| {
                lifecycle::start_task(event, task_id, actor, now)
            })
            .await?;

        tracing::info!(event_id = %event.id, task_id = %task_id, role = %actor.role, "Task started");
        Ok(TaskActionResponse {
            event: event_view(&event, now, self.boundary),
            stamp: None,
            unlocked: Vec::new(),
            relocked: Vec::new(),
        })
    }

    pub async fn complete_task(
        &self,
        actor: Actor,
        event_id: Uuid,
        task_id: Uuid,
        notes: Option<String>,
    ) -> ServiceResult<TaskActionResponse> {
        let boundary = self.boundary;
        let (event, outcome, now) = self
            .mutate(actor, event_id, |event, now| {
                lifecycle::complete_task(event, task_id, actor, notes, now, boundary)
            })
            .await?;

        tracing::info!(
            event_id = %event.id,
            task_id = %task_id,
            role = %actor.role,
            stamp_id = %outcome.stamp.stamp_id,
            unlocked = outcome.unlocked.len(),
            "Task completed"
        );

        if let Some(task) = event.task(task_id) {
            self.notifier.task_completed(&event, task, actor.user_id).await;
        }
        let unlocked: Vec<&EventTask> = outcome
            .unlocked
            .iter()
            .filter_map(|id| event.task(*id))
            .collect();
        if !unlocked.is_empty() {
            self.notifier
                .task_unlocked(&event, &unlocked, actor.user_id)
                .await;
        }
        if outcome.event_completed {
            tracing::info!(event_id = %event.id, "Event completed");
            self.notifier.event_completed(&event, actor.user_id).await;
        }

        Ok(TaskActionResponse {
            event: event_view(&event, now, self.boundary),
            stamp: Some(outcome.stamp),
            unlocked: outcome.unlocked,
            relocked: Vec::new(),
        })
    }

    pub async fn undo_task(
        &self,
        actor: Actor,
        event_id: Uuid,
        task_id: Uuid,
    ) -> ServiceResult<TaskActionResponse> {
        let boundary = self.boundary;
        let (event, outcome, now) = self
            .mutate(actor, event_id, |event, now| {
                lifecycle::undo_completion(event, task_id, actor, now, boundary)
            })
            .await?;

        tracing::info!(
            event_id = %event.id,
            task_id = %task_id,
            role = %actor.role,
            relocked = outcome.relocked.len(),
            "Task completion undone"
        );
        if let Some(task) = event.task(task_id) {
            self.notifier
                .task_completion_undone(&event, task, actor.user_id)
                .await;
        }

        Ok(TaskActionResponse {
            event: event_view(&event, now, self.boundary),
            stamp: None,
            unlocked: Vec::new(),
            relocked: outcome.relocked,
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Load, apply `op` to a copy, persist. Nothing is written if `op`
    /// fails, and the caller sees the stored row only after the write
    /// succeeded.
    async fn mutate<T, F>(
        &self,
        actor: Actor,
        event_id: Uuid,
        op: F,
    ) -> ServiceResult<(UniversalEvent, T, DateTime<Utc>)>
    where
        F: FnOnce(&mut UniversalEvent, DateTime<Utc>) -> Result<T, LifecycleError>,
    {
        let current = self.load_for_update(actor, event_id).await?;
        let now = self.clock.now();

        let mut next = current;
        let sealed = seal_event(&mut next, self.boundary.date_of(now));
        if sealed > 0 {
            tracing::debug!(event_id = %event_id, sealed, "Sealing stamps from previous days");
        }
        let value = op(&mut next, now).map_err(|e| {
            tracing::debug!(event_id = %event_id, error = %e, "Lifecycle operation rejected");
            e
        })?;

        let stored = self
            .store
            .update(event_id, &EventPatch::from_event(&next))
            .await
            .map_err(log_store_error)?;
        self.invalidate(event_id).await;
        Ok((stored, value, now))
    }

    async fn load(&self, event_id: Uuid) -> ServiceResult<UniversalEvent> {
        if let Some(cache) = &self.cache {
            if let Some(event) = cache.get::<UniversalEvent>(&keys::event(event_id)).await {
                return Ok(event);
            }
        }

        let event = self
            .store
            .get(event_id)
            .await
            .map_err(log_store_error)?
            .ok_or(ServiceError::EventNotFound(event_id))?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&keys::event(event_id), &event).await {
                tracing::warn!(event_id = %event_id, error = %e, "Failed to cache event");
            }
        }
        Ok(event)
    }

    /// Reads straight from the store; a cached copy may be older than the
    /// row the write would replace.
    async fn load_for_update(&self, actor: Actor, event_id: Uuid) -> ServiceResult<UniversalEvent> {
        let loaded = self
            .store
            .get_for_update(event_id)
            .await
            .map_err(log_store_error)?
            .ok_or(ServiceError::EventNotFound(event_id))?;
        if !actor.can_view(&loaded.event) {
            return Err(ServiceError::EventNotFound(event_id));
        }
        // Writing back would erase the entries that failed to decode
        if loaded.dropped_entries > 0 {
            return Err(log_store_error(StoreError::Malformed(format!(
                "event {event_id} has {} unreadable entries",
                loaded.dropped_entries
            ))));
        }
        Ok(loaded.event)
    }

    /// Events the actor cannot see are reported as missing
    async fn load_visible(&self, actor: Actor, event_id: Uuid) -> ServiceResult<UniversalEvent> {
        let event = self.load(event_id).await?;
        if !actor.can_view(&event) {
            return Err(ServiceError::EventNotFound(event_id));
        }
        Ok(event)
    }

    async fn visible_events(
        &self,
        actor: Actor,
        filter: &EventFilter,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<UniversalEvent>> {
        let mut scoped = filter.clone();
        if !actor.role.can(Capability::ViewAllEvents) {
            scoped.assigned_user = Some(actor.user_id);
        }
        // Overdue is never stored; the store filters what it can and the
        // effective status decides.
        let requested = scoped.status;
        if requested == Some(EventStatus::Overdue) {
            scoped.status = None;
        }

        let mut events = self.store.fetch(&scoped).await.map_err(log_store_error)?;
        if let Some(status) = requested {
            events.retain(|event| lifecycle::effective_status(event, now) == status);
        }
        Ok(events)
    }

    async fn invalidate(&self, event_id: Uuid) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(&keys::event(event_id)).await {
                tracing::warn!(event_id = %event_id, error = %e, "Failed to invalidate cached event");
            }
        }
    }
}

fn log_store_error(err: StoreError) -> ServiceError {
    match &err {
        StoreError::NotFound(_) | StoreError::Conflict(_) => {
            tracing::warn!(error = %err, "Event store rejected request")
        }
        _ => tracing::error!(error = ?err, "Event store failure"),
    }
    ServiceError::Store(err)
}
