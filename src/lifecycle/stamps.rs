//! Day-boundary locking of completion stamps
//!
//! A stamp created on an earlier calendar day than "today" is permanent and
//! can no longer be undone. The rule is applied on every read; the recorded
//! completion times are never touched by it.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use uuid::Uuid;

use crate::domain::{EventTask, TaskCompletion, TaskCompletionStamp, UniversalEvent};

/// Where calendar days begin, as a fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    offset: FixedOffset,
}

impl DayBoundary {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Parse an offset such as `+00:00` or `-05:00`
    pub fn parse(raw: &str) -> Result<Self, chrono::ParseError> {
        raw.trim().parse::<FixedOffset>().map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar date of `instant` on this boundary
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self::utc()
    }
}

/// Apply the day lock to a stamp view.
///
/// Idempotent and one-directional: a permanent stamp stays permanent
/// whatever `today` is.
pub fn lock_for_day(mut stamp: TaskCompletionStamp, today: NaiveDate) -> TaskCompletionStamp {
    if stamp.permanent || stamp.created_date < today {
        stamp.permanent = true;
        stamp.can_undo = false;
    } else {
        stamp.can_undo = true;
    }
    stamp
}

/// Persist the lock on a stored record. Returns true if the record changed.
pub fn seal_record(record: &mut TaskCompletion, today: NaiveDate) -> bool {
    if !record.permanent && record.created_date < today {
        record.permanent = true;
        return true;
    }
    false
}

/// Seal every completion record of an event, returning how many changed
pub fn seal_event(event: &mut UniversalEvent, today: NaiveDate) -> usize {
    event
        .tasks
        .iter_mut()
        .filter_map(|t| t.completion.as_mut())
        .map(|record| seal_record(record, today))
        .filter(|changed| *changed)
        .count()
}

/// Locked stamp view for one task, if it has been completed
pub fn stamp_for_task(
    event_id: Uuid,
    task: &EventTask,
    today: NaiveDate,
) -> Option<TaskCompletionStamp> {
    task.completion
        .as_ref()
        .map(|record| lock_for_day(TaskCompletionStamp::from_record(event_id, task, record), today))
}

/// Locked stamp views for every completed task of an event
pub fn stamps_for_event(event: &UniversalEvent, today: NaiveDate) -> Vec<TaskCompletionStamp> {
    event
        .tasks
        .iter()
        .filter_map(|task| stamp_for_task(event.id, task, today))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use chrono::{Duration, TimeZone};

    fn stamp(created: DateTime<Utc>, boundary: DayBoundary) -> TaskCompletionStamp {
        TaskCompletionStamp {
            stamp_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            task_title: "Diagnose issue".to_string(),
            completed_by_user: Uuid::new_v4(),
            completed_by_role: Role::Maintenance,
            completed_at: created,
            actual_completion_time: created,
            created_date: boundary.date_of(created),
            permanent: false,
            can_undo: true,
            notes: None,
        }
    }

    #[test]
    fn same_day_stays_undoable() {
        let boundary = DayBoundary::utc();
        let created = Utc.with_ymd_and_hms(2026, 3, 10, 9, 15, 0).unwrap();
        let locked = lock_for_day(stamp(created, boundary), boundary.date_of(created));
        assert!(locked.can_undo);
        assert!(!locked.permanent);
    }

    #[test]
    fn rollover_locks_without_touching_times() {
        let boundary = DayBoundary::utc();
        let created = Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 0).unwrap();
        let original = stamp(created, boundary);
        let tomorrow = boundary.date_of(created + Duration::minutes(2));

        let once = lock_for_day(original.clone(), tomorrow);
        assert!(once.permanent);
        assert!(!once.can_undo);
        assert_eq!(once.actual_completion_time, original.actual_completion_time);
        assert_eq!(once.completed_at, original.completed_at);

        let twice = lock_for_day(once.clone(), tomorrow);
        assert_eq!(twice, once);

        // An earlier "today" (clock skew) never unlocks it again.
        let skewed = lock_for_day(once, boundary.date_of(created));
        assert!(skewed.permanent);
        assert!(!skewed.can_undo);
    }

    #[test]
    fn seal_event_counts_only_newly_sealed_records() {
        use crate::domain::CreateEventRequest;
        use crate::lifecycle::{create_event, Actor, TemplateCatalog};

        let created = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let request = CreateEventRequest {
            event_type: "work-order".to_string(),
            title: None,
            description: None,
            scheduled_at: created,
            duration_minutes: None,
            priority: None,
            assigned_users: Vec::new(),
            property_id: None,
            unit_id: None,
            metadata: None,
        };
        let operator = Actor::new(Uuid::new_v4(), Role::Operator);
        let mut event = create_event(&TemplateCatalog::builtin(), &request, operator, created).unwrap();

        let record = |date: NaiveDate| TaskCompletion {
            stamp_id: Uuid::new_v4(),
            completed_by_user: Uuid::new_v4(),
            completed_by_role: Role::Maintenance,
            completed_at: created,
            actual_completion_time: created,
            created_date: date,
            permanent: false,
            notes: None,
        };
        let yesterday = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        event.tasks[0].completion = Some(record(yesterday));
        event.tasks[1].completion = Some(record(today));

        assert_eq!(seal_event(&mut event, today), 1);
        assert!(event.tasks[0].completion.as_ref().unwrap().permanent);
        assert!(!event.tasks[1].completion.as_ref().unwrap().permanent);

        // Already sealed records are not counted again
        assert_eq!(seal_event(&mut event, today), 0);
    }

    #[test]
    fn offset_moves_the_boundary() {
        let boundary = DayBoundary::parse("-05:00").unwrap();
        let instant = Utc.with_ymd_and_hms(2026, 3, 11, 3, 0, 0).unwrap();
        assert_eq!(
            boundary.date_of(instant),
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
        );
        assert!(DayBoundary::parse("not-an-offset").is_err());
    }
}
