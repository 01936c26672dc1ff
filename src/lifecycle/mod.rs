//! Event/task lifecycle
//!
//! Pure, synchronous state transitions over [`UniversalEvent`]. Nothing in
//! here touches storage or the clock; callers pass `now` in and persist the
//! result themselves.

pub mod catalog;
pub mod completion;
pub mod error;
pub mod graph;
pub mod instantiate;
pub mod schedule;
pub mod stamps;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Capability, EventResponse, Role, TaskResponse, UniversalEvent};

pub use catalog::TemplateCatalog;
pub use completion::{complete_task, start_task, undo_completion, CompletionOutcome, UndoOutcome};
pub use error::{LifecycleError, LifecycleResult};
pub use graph::TaskGraph;
pub use instantiate::{create_event, instantiate};
pub use schedule::{add_follow_up, cancel, effective_status, is_overdue, reschedule};
pub use stamps::{lock_for_day, seal_event, stamps_for_event, DayBoundary};

/// The user performing an operation and the role they act in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Whether this actor may see the event at all
    pub fn can_view(&self, event: &UniversalEvent) -> bool {
        self.role.can(Capability::ViewAllEvents) || event.involves(self.user_id)
    }
}

pub(crate) fn require(actor: Actor, capability: Capability) -> LifecycleResult<()> {
    if actor.role.can(capability) {
        Ok(())
    } else {
        Err(LifecycleError::MissingCapability {
            role: actor.role,
            capability,
        })
    }
}

/// Read view of an event with overdue classification and day locks applied
pub fn event_view(
    event: &UniversalEvent,
    now: DateTime<Utc>,
    boundary: DayBoundary,
) -> EventResponse {
    let today = boundary.date_of(now);
    let mut tasks: Vec<TaskResponse> = event
        .tasks
        .iter()
        .map(|task| TaskResponse::new(task, stamps::stamp_for_task(event.id, task, today)))
        .collect();
    tasks.sort_by_key(|t| {
        event
            .task(t.id)
            .map(|task| task.position)
            .unwrap_or(u32::MAX)
    });

    EventResponse {
        id: event.id,
        event_type: event.event_type.clone(),
        title: event.title.clone(),
        description: event.description.clone(),
        scheduled_at: event.scheduled_at,
        duration_minutes: event.duration_minutes,
        status: event.status,
        effective_status: effective_status(event, now),
        is_overdue: is_overdue(event, now),
        priority: event.priority,
        category: event.category,
        tasks,
        assigned_users: event.assigned_users.clone(),
        property_id: event.property_id,
        unit_id: event.unit_id,
        metadata: event.metadata.clone(),
        rescheduled_count: event.rescheduled_count,
        follow_ups: event.follow_ups.clone(),
        cancellation: event.cancellation.clone(),
        created_by: event.created_by,
        created_at: event.created_at,
        updated_at: event.updated_at,
    }
}
