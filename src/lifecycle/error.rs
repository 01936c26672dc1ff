use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Capability, EventStatus, Role, TaskStatus};

/// Validation failures of the event/task lifecycle.
///
/// Every variant leaves the event it was raised for unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("task {0} not found in event")]
    TaskNotFound(Uuid),

    #[error("role {role} may not act on a task assigned to {assigned}")]
    RoleNotPermitted { role: Role, assigned: Role },

    #[error("role {role} lacks capability {capability:?}")]
    MissingCapability { role: Role, capability: Capability },

    #[error("task {0} is locked by incomplete dependencies")]
    TaskLocked(Uuid),

    #[error("task {0} is already complete")]
    TaskAlreadyComplete(Uuid),

    #[error("task {0} is not complete")]
    TaskNotComplete(Uuid),

    #[error("completion of task {0} can no longer be undone")]
    NotUndoable(Uuid),

    #[error("task {task} has dependent task {dependent} already in progress or complete")]
    DependentTaskActive { task: Uuid, dependent: Uuid },

    #[error("task dependencies form a cycle through '{0}'")]
    DependencyCycle(String),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("duplicate task key '{0}'")]
    DuplicateTaskKey(String),

    #[error("duplicate template id '{0}'")]
    DuplicateTemplate(String),

    #[error("task '{task}' due offset of {minutes} minutes is out of range")]
    DueOffsetOutOfRange { task: String, minutes: i64 },

    #[error("scheduled time {0} is out of range")]
    ScheduleOutOfRange(DateTime<Utc>),

    #[error("cannot {action} an event that is {from}")]
    InvalidTransition {
        from: EventStatus,
        action: &'static str,
    },

    #[error("cannot {action} a task that is {from}")]
    InvalidTaskTransition {
        from: TaskStatus,
        action: &'static str,
    },
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
