//! Calendar event domain types
//!
//! A `UniversalEvent` is one scheduled occurrence of a property-management
//! activity (move-in, work order, tour, ...) together with the tasks copied
//! from its template.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roles::Role;
use super::tasks::{EventTask, TaskCompletionStamp, TaskResponse};

/// Event status enum
///
/// `Overdue` is only ever reported as an effective status; it is never
/// written to storage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EventStatus {
    Scheduled,
    InProgress,
    Overdue,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in-progress",
            Self::Overdue => "overdue",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Default for EventStatus {
    fn default() -> Self {
        Self::Scheduled
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event priority enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for EventPriority {
    fn default() -> Self {
        Self::Medium
    }
}

/// Event category enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EventCategory {
    Leasing,
    Maintenance,
    Inspection,
    VendorService,
    ResidentServices,
}

/// Kind of follow-up history entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpKind {
    Note,
    Rescheduled,
    Cancelled,
}

/// Follow-up history entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FollowUp {
    pub id: Uuid,
    pub kind: FollowUpKind,
    #[serde(default)]
    pub note: Option<String>,
    pub author_id: Uuid,
    pub author_role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub previous_scheduled_at: Option<DateTime<Utc>>,
}

/// Cancellation details
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cancellation {
    pub cancelled_by: Uuid,
    pub cancelled_by_role: Role,
    pub cancelled_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Event entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UniversalEvent {
    pub id: Uuid,
    /// Template identifier, e.g. `work-order`
    pub event_type: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub status: EventStatus,
    pub priority: EventPriority,
    pub category: EventCategory,
    pub tasks: Vec<EventTask>,
    pub assigned_users: Vec<Uuid>,
    pub property_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub rescheduled_count: u32,
    pub follow_ups: Vec<FollowUp>,
    pub cancellation: Option<Cancellation>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UniversalEvent {
    pub fn task(&self, task_id: Uuid) -> Option<&EventTask> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: Uuid) -> Option<&mut EventTask> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Whether `user_id` is a participant of this event
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.created_by == user_id || self.assigned_users.contains(&user_id)
    }
}

/// Request DTO for creating an event from a template
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub priority: Option<EventPriority>,
    #[serde(default)]
    pub assigned_users: Vec<Uuid>,
    #[serde(default)]
    pub property_id: Option<Uuid>,
    #[serde(default)]
    pub unit_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Request DTO for rescheduling an event
#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleEventRequest {
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Request DTO for cancelling an event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelEventRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request DTO for appending a follow-up note
#[derive(Debug, Clone, Deserialize)]
pub struct AddFollowUpRequest {
    pub note: String,
}

/// Filter criteria for event queries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    #[serde(default)]
    pub property_id: Option<Uuid>,
    #[serde(default)]
    pub event_type: Option<String>,
    /// Matched against the effective status, so `scheduled` leaves out
    /// overdue events. Stores never hold `overdue` and filter on the stored
    /// value.
    #[serde(default)]
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_user: Option<Uuid>,
}

impl EventFilter {
    pub fn matches(&self, event: &UniversalEvent) -> bool {
        self.property_id.map_or(true, |p| event.property_id == Some(p))
            && self
                .event_type
                .as_deref()
                .map_or(true, |t| event.event_type == t)
            && self.status.map_or(true, |s| event.status == s)
            && self.from.map_or(true, |from| event.scheduled_at >= from)
            && self.to.map_or(true, |to| event.scheduled_at < to)
            && self.assigned_user.map_or(true, |u| event.involves(u))
    }
}

/// Response DTO for event
#[derive(Debug, Clone, Serialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub event_type: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub status: EventStatus,
    /// Status with overdue classification applied at read time
    pub effective_status: EventStatus,
    pub is_overdue: bool,
    pub priority: EventPriority,
    pub category: EventCategory,
    pub tasks: Vec<TaskResponse>,
    pub assigned_users: Vec<Uuid>,
    pub property_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub rescheduled_count: u32,
    pub follow_ups: Vec<FollowUp>,
    pub cancellation: Option<Cancellation>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a task start, completion or undo
#[derive(Debug, Clone, Serialize)]
pub struct TaskActionResponse {
    pub event: EventResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamp: Option<TaskCompletionStamp>,
    /// Tasks that became available
    pub unlocked: Vec<Uuid>,
    /// Tasks that went back to locked
    pub relocked: Vec<Uuid>,
}

/// Query params for listing stamps completed on a given day
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StampQuery {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}
