//! Event task domain types
//!
//! Tasks belong to exactly one event and never exist on their own. A task's
//! completion is recorded once, in [`TaskCompletion`]; the stamp handed to
//! clients is a view derived from that record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roles::Role;

/// Task status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Locked,
    Available,
    InProgress,
    Complete,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Available => "available",
            Self::InProgress => "in-progress",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative record of one task completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCompletion {
    pub stamp_id: Uuid,
    pub completed_by_user: Uuid,
    pub completed_by_role: Role,
    pub completed_at: DateTime<Utc>,
    pub actual_completion_time: DateTime<Utc>,
    /// Calendar date (in the day-boundary offset) the stamp was created on
    pub created_date: NaiveDate,
    /// Sticky: once set it is never cleared
    #[serde(default)]
    pub permanent: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Task entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventTask {
    pub id: Uuid,
    /// Stable key copied from the template entry
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub assigned_role: Role,
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    #[serde(default = "default_true")]
    pub is_required: bool,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub completion: Option<TaskCompletion>,
}

fn default_true() -> bool {
    true
}

impl EventTask {
    pub fn is_complete(&self) -> bool {
        self.status == TaskStatus::Complete
    }
}

/// Read view over a [`TaskCompletion`]
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskCompletionStamp {
    pub stamp_id: Uuid,
    pub event_id: Uuid,
    pub task_id: Uuid,
    pub task_title: String,
    pub completed_by_user: Uuid,
    pub completed_by_role: Role,
    pub completed_at: DateTime<Utc>,
    pub actual_completion_time: DateTime<Utc>,
    pub created_date: NaiveDate,
    pub permanent: bool,
    pub can_undo: bool,
    pub notes: Option<String>,
}

impl TaskCompletionStamp {
    /// Unlocked view of a fresh or stored record; run it through
    /// `lifecycle::stamps::lock_for_day` before handing it out.
    pub fn from_record(event_id: Uuid, task: &EventTask, record: &TaskCompletion) -> Self {
        Self {
            stamp_id: record.stamp_id,
            event_id,
            task_id: task.id,
            task_title: task.title.clone(),
            completed_by_user: record.completed_by_user,
            completed_by_role: record.completed_by_role,
            completed_at: record.completed_at,
            actual_completion_time: record.actual_completion_time,
            created_date: record.created_date,
            permanent: record.permanent,
            can_undo: !record.permanent,
            notes: record.notes.clone(),
        }
    }
}

/// Request DTO for completing a task
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteTaskRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// Response DTO for task
#[derive(Debug, Clone, Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub assigned_role: Role,
    pub status: TaskStatus,
    pub is_complete: bool,
    pub is_required: bool,
    pub dependencies: Vec<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Role>,
    pub stamp: Option<TaskCompletionStamp>,
}

impl TaskResponse {
    pub fn new(task: &EventTask, stamp: Option<TaskCompletionStamp>) -> Self {
        Self {
            id: task.id,
            key: task.key.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            assigned_role: task.assigned_role,
            status: task.status,
            is_complete: task.is_complete(),
            is_required: task.is_required,
            dependencies: task.dependencies.clone(),
            due_date: task.due_date,
            completed_at: task.completion.as_ref().map(|c| c.completed_at),
            completed_by: task.completion.as_ref().map(|c| c.completed_by_role),
            stamp,
        }
    }
}
