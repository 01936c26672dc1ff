mod common;

use chrono::{Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{nine_am, task, task_id, Harness};
use leasehold_backend::api::PaginationParams;
use leasehold_backend::domain::notifications::NotificationType;
use leasehold_backend::domain::{
    EventFilter, EventStatus, FollowUpKind, RescheduleEventRequest, TaskStatus,
};
use leasehold_backend::lifecycle::LifecycleError;
use leasehold_backend::services::ServiceError;
use leasehold_backend::store::{EventStore, StoreChange, StoreError};

#[tokio::test]
async fn work_order_unlocks_diagnosis_after_submission() {
    let h = Harness::new();
    let event = h.create("work-order", nine_am()).await;

    assert_eq!(event.status, EventStatus::Scheduled);
    assert_eq!(event.rescheduled_count, 0);
    assert!(event.follow_ups.is_empty());
    assert_eq!(task(&event, "submit-with-photos").status, TaskStatus::Available);
    assert_eq!(task(&event, "diagnose").status, TaskStatus::Locked);

    let submit = task_id(&event, "submit-with-photos");
    let result = h
        .service
        .complete_task(h.resident, event.id, submit, Some("photos attached".into()))
        .await
        .unwrap();

    let diagnose = task_id(&event, "diagnose");
    assert_eq!(result.unlocked, vec![diagnose]);
    assert_eq!(task(&result.event, "diagnose").status, TaskStatus::Available);
    assert_eq!(task(&result.event, "resolve").status, TaskStatus::Locked);
    assert_eq!(result.event.status, EventStatus::InProgress);

    let stamp = result.stamp.unwrap();
    assert_eq!(stamp.completed_by_user, h.resident.user_id);
    assert_eq!(stamp.completed_at, nine_am());
    assert_eq!(stamp.actual_completion_time, nine_am());
    assert!(stamp.can_undo);

    let unlocked = h.sink.of_type(NotificationType::TaskUnlocked);
    assert!(unlocked.iter().any(|n| n.user_id == h.maintenance.user_id));
    assert!(unlocked.iter().all(|n| n.user_id != h.resident.user_id));
}

#[tokio::test]
async fn locked_task_cannot_be_completed() {
    let h = Harness::new();
    let event = h.create("work-order", nine_am()).await;
    let resolve = task_id(&event, "resolve");

    let err = h
        .service
        .complete_task(h.maintenance, event.id, resolve, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Lifecycle(LifecycleError::TaskLocked(id)) if id == resolve
    ));
}

#[tokio::test]
async fn wrong_role_leaves_task_incomplete_without_stamp() {
    let h = Harness::new();
    let event = h.create("work-order", nine_am()).await;
    let submit = task_id(&event, "submit-with-photos");

    let err = h
        .service
        .complete_task(h.maintenance, event.id, submit, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Lifecycle(LifecycleError::RoleNotPermitted { .. })
    ));

    let reloaded = h.service.get(h.operator, event.id).await.unwrap();
    assert!(!task(&reloaded, "submit-with-photos").is_complete);
    assert!(h
        .service
        .event_stamps(h.operator, event.id)
        .await
        .unwrap()
        .is_empty());
    assert!(h.sink.of_type(NotificationType::TaskCompleted).is_empty());
}

#[tokio::test]
async fn event_scheduled_yesterday_afternoon_is_overdue() {
    let h = Harness::new();
    let yesterday_2pm = Utc.with_ymd_and_hms(2026, 6, 1, 14, 0, 0).unwrap();
    let event = h.create("tour", yesterday_2pm).await;

    assert_eq!(event.status, EventStatus::Scheduled);
    assert_eq!(event.effective_status, EventStatus::Overdue);
    assert!(event.is_overdue);

    let filter = EventFilter {
        status: Some(EventStatus::Overdue),
        ..EventFilter::default()
    };
    let (overdue, total) = h
        .service
        .list(h.operator, &filter, &PaginationParams::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(overdue[0].id, event.id);

    // Finish every required task; a completed event is never overdue
    for key in ["confirm-tour", "prepare-tour", "conduct-tour"] {
        h.service
            .complete_task(h.admin, event.id, task_id(&event, key), None)
            .await
            .unwrap();
    }
    let done = h.service.get(h.operator, event.id).await.unwrap();
    assert_eq!(done.status, EventStatus::Completed);
    assert_eq!(done.effective_status, EventStatus::Completed);
    assert!(!done.is_overdue);
    assert_eq!(h.sink.of_type(NotificationType::EventCompleted).len(), 4);
}

#[tokio::test]
async fn status_filter_follows_effective_status() {
    let h = Harness::new();
    let late = h
        .create("tour", Utc.with_ymd_and_hms(2026, 6, 1, 14, 0, 0).unwrap())
        .await;
    let upcoming = h.create("tour", nine_am() + Duration::days(1)).await;

    let scheduled = EventFilter {
        status: Some(EventStatus::Scheduled),
        ..EventFilter::default()
    };
    let (events, total) = h
        .service
        .list(h.operator, &scheduled, &PaginationParams::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(events[0].id, upcoming.id);
    assert_ne!(events[0].id, late.id);
}

#[tokio::test]
async fn reschedule_counts_once_and_keeps_stamps() {
    let h = Harness::new();
    let event = h.create("tour", nine_am() + Duration::hours(4)).await;
    h.service
        .complete_task(h.prospect, event.id, task_id(&event, "confirm-tour"), None)
        .await
        .unwrap();
    let before = h.service.event_stamps(h.operator, event.id).await.unwrap();

    let request = RescheduleEventRequest {
        scheduled_at: nine_am() + Duration::days(1),
        duration_minutes: None,
        note: Some("Prospect asked for tomorrow".into()),
    };
    let moved = h
        .service
        .reschedule(h.operator, event.id, &request)
        .await
        .unwrap();

    assert_eq!(moved.rescheduled_count, 1);
    assert_eq!(moved.scheduled_at, request.scheduled_at);
    let entry = moved.follow_ups.last().unwrap();
    assert_eq!(entry.kind, FollowUpKind::Rescheduled);
    assert_eq!(entry.previous_scheduled_at, Some(nine_am() + Duration::hours(4)));

    let after = h.service.event_stamps(h.operator, event.id).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(h.sink.of_type(NotificationType::EventRescheduled).len(), 3);
}

#[tokio::test]
async fn cancelling_terminal_event_fails_and_keeps_status() {
    let h = Harness::new();
    let event = h.create("inspection", nine_am()).await;

    let cancelled = h
        .service
        .cancel(h.operator, event.id, Some("Resident away".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, EventStatus::Cancelled);
    assert_eq!(
        cancelled.cancellation.as_ref().unwrap().reason.as_deref(),
        Some("Resident away")
    );

    let err = h
        .service
        .cancel(h.operator, event.id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Lifecycle(LifecycleError::InvalidTransition {
            from: EventStatus::Cancelled,
            ..
        })
    ));

    let reschedule = RescheduleEventRequest {
        scheduled_at: nine_am() + Duration::days(2),
        duration_minutes: None,
        note: None,
    };
    assert!(h
        .service
        .reschedule(h.operator, event.id, &reschedule)
        .await
        .is_err());

    let reloaded = h.service.get(h.operator, event.id).await.unwrap();
    assert_eq!(reloaded.status, EventStatus::Cancelled);
    assert_eq!(reloaded.rescheduled_count, 0);
}

#[tokio::test]
async fn resident_cannot_cancel() {
    let h = Harness::new();
    let event = h.create("move-in", nine_am() + Duration::days(7)).await;

    let err = h
        .service
        .cancel(h.resident, event.id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Lifecycle(LifecycleError::MissingCapability { .. })
    ));
}

#[tokio::test]
async fn failed_write_leaves_stored_event_unchanged() {
    let h = Harness::new();
    let event = h.create("work-order", nine_am()).await;
    let submit = task_id(&event, "submit-with-photos");

    h.store.set_fail_writes(true);
    let err = h
        .service
        .complete_task(h.resident, event.id, submit, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Store(StoreError::Unavailable(_))));

    let stored = h.store.get(event.id).await.unwrap().unwrap();
    let stored_task = stored.task(submit).unwrap();
    assert_eq!(stored_task.status, TaskStatus::Available);
    assert!(stored_task.completion.is_none());
    assert!(h.sink.of_type(NotificationType::TaskCompleted).is_empty());

    h.store.set_fail_writes(false);
    h.service
        .complete_task(h.resident, event.id, submit, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn notification_failures_do_not_fail_operations() {
    let h = Harness::new();
    h.sink.set_fail(true);
    let event = h.create("work-order", nine_am()).await;

    let result = h
        .service
        .complete_task(
            h.resident,
            event.id,
            task_id(&event, "submit-with-photos"),
            None,
        )
        .await;
    assert!(result.is_ok());
    assert!(h.sink.delivered().is_empty());
}

#[tokio::test]
async fn uninvolved_users_cannot_see_events() {
    let h = Harness::new();
    let event = h.create("work-order", nine_am()).await;
    let stranger = leasehold_backend::lifecycle::Actor::new(
        uuid::Uuid::new_v4(),
        leasehold_backend::domain::Role::Resident,
    );

    let err = h.service.get(stranger, event.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::EventNotFound(id) if id == event.id));

    let (visible, total) = h
        .service
        .list(stranger, &EventFilter::default(), &PaginationParams::default())
        .await
        .unwrap();
    assert!(visible.is_empty());
    assert_eq!(total, 0);

    let (mine, _) = h
        .service
        .list(h.resident, &EventFilter::default(), &PaginationParams::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn list_paginates_in_schedule_order() {
    let h = Harness::new();
    for day in [3, 1, 2] {
        h.create("inspection", nine_am() + Duration::days(day)).await;
    }

    let page = PaginationParams {
        page: Some(1),
        per_page: Some(2),
    };
    let (first, total) = h
        .service
        .list(h.operator, &EventFilter::default(), &page)
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(first.len(), 2);
    assert!(first[0].scheduled_at < first[1].scheduled_at);
}

#[tokio::test]
async fn follow_up_notes_are_appended() {
    let h = Harness::new();
    let event = h.create("work-order", nine_am()).await;

    let note = h
        .service
        .add_follow_up(h.resident, event.id, "Still dripping".into())
        .await
        .unwrap();
    assert_eq!(note.kind, FollowUpKind::Note);
    assert_eq!(note.author_id, h.resident.user_id);

    let reloaded = h.service.get(h.operator, event.id).await.unwrap();
    assert_eq!(reloaded.follow_ups.len(), 1);
}

#[tokio::test]
async fn start_then_complete_moves_event_forward() {
    let h = Harness::new();
    let event = h.create("work-order", nine_am()).await;
    let submit = task_id(&event, "submit-with-photos");

    let started = h
        .service
        .start_task(h.resident, event.id, submit)
        .await
        .unwrap();
    assert_eq!(started.event.status, EventStatus::InProgress);
    assert_eq!(task(&started.event, "submit-with-photos").status, TaskStatus::InProgress);

    let completed = h
        .service
        .complete_task(h.resident, event.id, submit, None)
        .await
        .unwrap();
    assert!(task(&completed.event, "submit-with-photos").is_complete);
}

#[tokio::test]
async fn subscribers_see_commits_until_dropped() {
    let h = Harness::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let subscription = h.store.subscribe(Arc::new(move |change: &StoreChange| {
        if matches!(change, StoreChange::Inserted(_) | StoreChange::Updated(_)) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }));

    let event = h.create("work-order", nine_am()).await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    drop(subscription);
    h.service
        .add_follow_up(h.operator, event.id, "Vendor booked".into())
        .await
        .unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_template_is_rejected() {
    let h = Harness::new();
    let err = h
        .service
        .create(h.operator, &h.request("pool-party", nine_am()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Lifecycle(LifecycleError::TemplateNotFound(ref id)) if id == "pool-party"
    ));
    assert!(h.store.is_empty());
}
