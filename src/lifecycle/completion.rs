//! Task start, completion and undo with dependency gating
//!
//! All checks run before the event is touched, so a failed operation leaves
//! it exactly as it was.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::{LifecycleError, LifecycleResult};
use super::stamps::{lock_for_day, DayBoundary};
use super::Actor;
use crate::domain::{
    EventStatus, EventTask, TaskCompletion, TaskCompletionStamp, TaskStatus, UniversalEvent,
};

/// What a successful completion changed
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub stamp: TaskCompletionStamp,
    /// Sibling tasks that became available
    pub unlocked: Vec<Uuid>,
    pub event_completed: bool,
}

/// What a successful undo changed
#[derive(Debug, Clone, PartialEq)]
pub struct UndoOutcome {
    /// Sibling tasks that went back to locked
    pub relocked: Vec<Uuid>,
}

fn ensure_open(event: &UniversalEvent, action: &'static str) -> LifecycleResult<()> {
    if event.status.is_terminal() {
        return Err(LifecycleError::InvalidTransition {
            from: event.status,
            action,
        });
    }
    Ok(())
}

fn find_task(event: &UniversalEvent, task_id: Uuid) -> LifecycleResult<&EventTask> {
    event
        .task(task_id)
        .ok_or(LifecycleError::TaskNotFound(task_id))
}

fn dependencies_met(event: &UniversalEvent, task: &EventTask) -> bool {
    task.dependencies
        .iter()
        .all(|dep| event.task(*dep).is_some_and(EventTask::is_complete))
}

/// Shared gate for starting and completing a task
fn check_actionable(event: &UniversalEvent, task: &EventTask, actor: Actor) -> LifecycleResult<()> {
    match task.status {
        TaskStatus::Complete => return Err(LifecycleError::TaskAlreadyComplete(task.id)),
        TaskStatus::Locked => return Err(LifecycleError::TaskLocked(task.id)),
        TaskStatus::Available | TaskStatus::InProgress => {}
    }
    if !actor.role.can_act_on_task(task.assigned_role) {
        return Err(LifecycleError::RoleNotPermitted {
            role: actor.role,
            assigned: task.assigned_role,
        });
    }
    if !dependencies_met(event, task) {
        return Err(LifecycleError::TaskLocked(task.id));
    }
    Ok(())
}

/// Flip locked tasks whose dependencies are all complete to available.
///
/// Returns the ids that changed.
pub fn unlock_ready(event: &mut UniversalEvent) -> Vec<Uuid> {
    let ready: Vec<Uuid> = event
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Locked && dependencies_met(event, t))
        .map(|t| t.id)
        .collect();
    for id in &ready {
        if let Some(task) = event.task_mut(*id) {
            task.status = TaskStatus::Available;
        }
    }
    ready
}

/// Mark a task as being worked on (`available -> in-progress`).
pub fn start_task(
    event: &mut UniversalEvent,
    task_id: Uuid,
    actor: Actor,
    now: DateTime<Utc>,
) -> LifecycleResult<()> {
    ensure_open(event, "start a task in")?;
    let task = find_task(event, task_id)?;
    if task.status == TaskStatus::InProgress {
        return Err(LifecycleError::InvalidTaskTransition {
            from: task.status,
            action: "start",
        });
    }
    check_actionable(event, task, actor)?;

    if let Some(task) = event.task_mut(task_id) {
        task.status = TaskStatus::InProgress;
    }
    if event.status == EventStatus::Scheduled {
        event.status = EventStatus::InProgress;
    }
    event.updated_at = now;
    Ok(())
}

/// Complete a task and emit its stamp.
///
/// The acting role must match the task's assigned role (or hold the
/// override capability) and every dependency must already be complete.
pub fn complete_task(
    event: &mut UniversalEvent,
    task_id: Uuid,
    actor: Actor,
    notes: Option<String>,
    now: DateTime<Utc>,
    boundary: DayBoundary,
) -> LifecycleResult<CompletionOutcome> {
    ensure_open(event, "complete a task in")?;
    let task = find_task(event, task_id)?;
    check_actionable(event, task, actor)?;

    let record = TaskCompletion {
        stamp_id: Uuid::new_v4(),
        completed_by_user: actor.user_id,
        completed_by_role: actor.role,
        completed_at: now,
        actual_completion_time: now,
        created_date: boundary.date_of(now),
        permanent: false,
        notes,
    };

    let event_id = event.id;
    let stamp = match event.task_mut(task_id) {
        Some(task) => {
            task.status = TaskStatus::Complete;
            let stamp = TaskCompletionStamp::from_record(event_id, task, &record);
            task.completion = Some(record);
            lock_for_day(stamp, boundary.date_of(now))
        }
        None => return Err(LifecycleError::TaskNotFound(task_id)),
    };

    let unlocked = unlock_ready(event);

    let all_required_done = event
        .tasks
        .iter()
        .filter(|t| t.is_required)
        .all(EventTask::is_complete);
    let event_completed = all_required_done;
    event.status = if all_required_done {
        EventStatus::Completed
    } else {
        EventStatus::InProgress
    };
    event.updated_at = now;

    Ok(CompletionOutcome {
        stamp,
        unlocked,
        event_completed,
    })
}

/// Undo a completion while its stamp is still undoable.
///
/// Only the completing role (or an override role) may undo, and only on
/// the calendar day the stamp was created. Dependents that already started
/// or completed block the undo.
pub fn undo_completion(
    event: &mut UniversalEvent,
    task_id: Uuid,
    actor: Actor,
    now: DateTime<Utc>,
    boundary: DayBoundary,
) -> LifecycleResult<UndoOutcome> {
    ensure_open(event, "undo a task in")?;
    let task = find_task(event, task_id)?;
    let record = match (&task.completion, task.status) {
        (Some(record), TaskStatus::Complete) => record,
        _ => return Err(LifecycleError::TaskNotComplete(task_id)),
    };

    if !actor.role.can_act_on_task(record.completed_by_role) {
        return Err(LifecycleError::RoleNotPermitted {
            role: actor.role,
            assigned: record.completed_by_role,
        });
    }

    let stamp = lock_for_day(
        TaskCompletionStamp::from_record(event.id, task, record),
        boundary.date_of(now),
    );
    if !stamp.can_undo {
        return Err(LifecycleError::NotUndoable(task_id));
    }

    let dependents: Vec<&EventTask> = event
        .tasks
        .iter()
        .filter(|t| t.dependencies.contains(&task_id))
        .collect();
    if let Some(active) = dependents
        .iter()
        .find(|t| matches!(t.status, TaskStatus::InProgress | TaskStatus::Complete))
    {
        return Err(LifecycleError::DependentTaskActive {
            task: task_id,
            dependent: active.id,
        });
    }
    let relocked: Vec<Uuid> = dependents
        .iter()
        .filter(|t| t.status == TaskStatus::Available)
        .map(|t| t.id)
        .collect();

    if let Some(task) = event.task_mut(task_id) {
        task.completion = None;
        task.status = TaskStatus::Available;
    }
    for id in &relocked {
        if let Some(task) = event.task_mut(*id) {
            task.status = TaskStatus::Locked;
        }
    }
    event.updated_at = now;

    Ok(UndoOutcome { relocked })
}
