//! Rescheduling, cancellation, follow-ups and overdue classification

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::{LifecycleError, LifecycleResult};
use super::{require, Actor};
use crate::domain::{
    Cancellation, Capability, EventStatus, FollowUp, FollowUpKind, RescheduleEventRequest,
    UniversalEvent,
};

/// Whether the event's scheduled instant has passed while it is still open.
///
/// Always computed from `now`; never stored.
pub fn is_overdue(event: &UniversalEvent, now: DateTime<Utc>) -> bool {
    !event.status.is_terminal() && event.scheduled_at < now
}

/// Stored status with overdue classification applied
pub fn effective_status(event: &UniversalEvent, now: DateTime<Utc>) -> EventStatus {
    if is_overdue(event, now) {
        EventStatus::Overdue
    } else {
        event.status
    }
}

fn follow_up(
    kind: FollowUpKind,
    actor: Actor,
    note: Option<String>,
    now: DateTime<Utc>,
) -> FollowUp {
    FollowUp {
        id: Uuid::new_v4(),
        kind,
        note,
        author_id: actor.user_id,
        author_role: actor.role,
        created_at: now,
        previous_scheduled_at: None,
    }
}

/// Move an event to a new instant.
///
/// Increments `rescheduled_count` by one and shifts due dates of tasks that
/// are not complete yet. Completion records are left as they are.
pub fn reschedule(
    event: &mut UniversalEvent,
    request: &RescheduleEventRequest,
    actor: Actor,
    now: DateTime<Utc>,
) -> LifecycleResult<DateTime<Utc>> {
    require(actor, Capability::RescheduleEvent)?;
    if event.status.is_terminal() {
        return Err(LifecycleError::InvalidTransition {
            from: event.status,
            action: "reschedule",
        });
    }

    let previous = event.scheduled_at;
    let delta = request.scheduled_at - previous;
    // Overflow must leave the event unchanged
    let mut shifted = Vec::new();
    for (i, task) in event.tasks.iter().enumerate() {
        if task.is_complete() {
            continue;
        }
        if let Some(due) = task.due_date {
            let moved = due
                .checked_add_signed(delta)
                .ok_or(LifecycleError::ScheduleOutOfRange(request.scheduled_at))?;
            shifted.push((i, moved));
        }
    }
    for (i, moved) in shifted {
        event.tasks[i].due_date = Some(moved);
    }

    event.scheduled_at = request.scheduled_at;
    if request.duration_minutes.is_some() {
        event.duration_minutes = request.duration_minutes;
    }
    event.rescheduled_count += 1;

    let mut entry = follow_up(FollowUpKind::Rescheduled, actor, request.note.clone(), now);
    entry.previous_scheduled_at = Some(previous);
    event.follow_ups.push(entry);
    event.updated_at = now;

    Ok(previous)
}

/// Cancel an open event
pub fn cancel(
    event: &mut UniversalEvent,
    reason: Option<String>,
    actor: Actor,
    now: DateTime<Utc>,
) -> LifecycleResult<()> {
    require(actor, Capability::CancelEvent)?;
    if event.status.is_terminal() {
        return Err(LifecycleError::InvalidTransition {
            from: event.status,
            action: "cancel",
        });
    }

    event.status = EventStatus::Cancelled;
    event.cancellation = Some(Cancellation {
        cancelled_by: actor.user_id,
        cancelled_by_role: actor.role,
        cancelled_at: now,
        reason: reason.clone(),
    });
    event
        .follow_ups
        .push(follow_up(FollowUpKind::Cancelled, actor, reason, now));
    event.updated_at = now;
    Ok(())
}

/// Append a note to the event's follow-up history
pub fn add_follow_up(
    event: &mut UniversalEvent,
    note: String,
    actor: Actor,
    now: DateTime<Utc>,
) -> LifecycleResult<FollowUp> {
    require(actor, Capability::AddFollowUp)?;
    if event.status == EventStatus::Cancelled {
        return Err(LifecycleError::InvalidTransition {
            from: event.status,
            action: "add a follow-up to",
        });
    }

    let entry = follow_up(FollowUpKind::Note, actor, Some(note), now);
    event.follow_ups.push(entry.clone());
    event.updated_at = now;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateEventRequest, Role};
    use crate::lifecycle::{complete_task, create_event, DayBoundary, TemplateCatalog};
    use chrono::{Duration, TimeZone};

    fn operator() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Operator)
    }

    fn event_at(scheduled_at: DateTime<Utc>, created: DateTime<Utc>) -> UniversalEvent {
        let request = CreateEventRequest {
            event_type: "move-in".to_string(),
            title: None,
            description: None,
            scheduled_at,
            duration_minutes: None,
            priority: None,
            assigned_users: Vec::new(),
            property_id: None,
            unit_id: None,
            metadata: None,
        };
        create_event(&TemplateCatalog::builtin(), &request, operator(), created).unwrap()
    }

    #[test]
    fn yesterday_afternoon_is_overdue_until_completed() {
        let today = Utc.with_ymd_and_hms(2026, 7, 15, 8, 0, 0).unwrap();
        let yesterday = Utc.with_ymd_and_hms(2026, 7, 14, 14, 0, 0).unwrap();
        let mut event = event_at(yesterday, yesterday - Duration::days(3));

        assert!(is_overdue(&event, today));
        assert_eq!(effective_status(&event, today), EventStatus::Overdue);
        assert_eq!(event.status, EventStatus::Scheduled);

        event.status = EventStatus::Completed;
        assert!(!is_overdue(&event, today));
        event.status = EventStatus::Cancelled;
        assert!(!is_overdue(&event, today));
    }

    #[test]
    fn exact_instant_is_not_overdue() {
        let at = Utc.with_ymd_and_hms(2026, 7, 15, 8, 0, 0).unwrap();
        let event = event_at(at, at - Duration::days(1));
        assert!(!is_overdue(&event, at));
        assert!(is_overdue(&event, at + Duration::seconds(1)));
    }

    #[test]
    fn reschedule_counts_once_and_keeps_stamps() {
        let created = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap();
        let original = Utc.with_ymd_and_hms(2026, 7, 10, 9, 0, 0).unwrap();
        let mut event = event_at(original, created);

        let sign = event.tasks.iter().find(|t| t.key == "sign-lease").unwrap().id;
        let resident = Actor::new(Uuid::new_v4(), Role::Resident);
        complete_task(&mut event, sign, resident, None, created, DayBoundary::utc()).unwrap();
        let record_before = event.task(sign).unwrap().completion.clone();
        let sign_due_before = event.task(sign).unwrap().due_date;
        let deposit = event.tasks.iter().find(|t| t.key == "pay-deposit").unwrap().id;
        let deposit_due_before = event.task(deposit).unwrap().due_date.unwrap();

        let request = RescheduleEventRequest {
            scheduled_at: original + Duration::days(2),
            duration_minutes: None,
            note: Some("Resident asked for the weekend".to_string()),
        };
        let previous = reschedule(&mut event, &request, operator(), created).unwrap();

        assert_eq!(previous, original);
        assert_eq!(event.rescheduled_count, 1);
        assert_eq!(event.task(sign).unwrap().completion, record_before);
        assert_eq!(event.task(sign).unwrap().due_date, sign_due_before);
        assert_eq!(
            event.task(deposit).unwrap().due_date,
            Some(deposit_due_before + Duration::days(2))
        );
        let entry = event.follow_ups.last().unwrap();
        assert_eq!(entry.kind, FollowUpKind::Rescheduled);
        assert_eq!(entry.previous_scheduled_at, Some(original));
    }

    #[test]
    fn reschedule_past_the_calendar_range_is_rejected() {
        let at = Utc.with_ymd_and_hms(2026, 7, 10, 9, 0, 0).unwrap();
        let mut event = event_at(at, at);
        let before = event.clone();

        let far = DateTime::<Utc>::MAX_UTC - Duration::hours(1);
        let request = RescheduleEventRequest {
            scheduled_at: far,
            duration_minutes: None,
            note: None,
        };
        let err = reschedule(&mut event, &request, operator(), at).unwrap_err();
        assert_eq!(err, LifecycleError::ScheduleOutOfRange(far));
        assert_eq!(event, before);
    }

    #[test]
    fn cancelling_terminal_events_fails() {
        let at = Utc.with_ymd_and_hms(2026, 7, 10, 9, 0, 0).unwrap();
        let mut event = event_at(at, at);

        cancel(&mut event, Some("Unit sold".to_string()), operator(), at).unwrap();
        assert_eq!(event.status, EventStatus::Cancelled);

        let err = cancel(&mut event, None, operator(), at).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: EventStatus::Cancelled,
                action: "cancel"
            }
        );
        assert_eq!(event.status, EventStatus::Cancelled);

        let mut done = event_at(at, at);
        done.status = EventStatus::Completed;
        assert!(cancel(&mut done, None, operator(), at).is_err());
        assert_eq!(done.status, EventStatus::Completed);
    }

    #[test]
    fn vendors_cannot_reschedule() {
        let at = Utc.with_ymd_and_hms(2026, 7, 10, 9, 0, 0).unwrap();
        let mut event = event_at(at, at);
        let vendor = Actor::new(Uuid::new_v4(), Role::Vendor);
        let request = RescheduleEventRequest {
            scheduled_at: at + Duration::hours(3),
            duration_minutes: None,
            note: None,
        };
        let err = reschedule(&mut event, &request, vendor, at).unwrap_err();
        assert!(matches!(err, LifecycleError::MissingCapability { .. }));
        assert_eq!(event.rescheduled_count, 0);
    }
}
