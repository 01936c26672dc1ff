//! Event creation from templates

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use super::catalog::TemplateCatalog;
use super::error::{LifecycleError, LifecycleResult};
use super::graph::TaskGraph;
use super::{require, Actor};
use crate::domain::{
    Capability, CreateEventRequest, EventStatus, EventTask, EventTemplate, TaskStatus,
    UniversalEvent,
};

/// Look up the requested template and create an event from it.
pub fn create_event(
    catalog: &TemplateCatalog,
    request: &CreateEventRequest,
    actor: Actor,
    now: DateTime<Utc>,
) -> LifecycleResult<UniversalEvent> {
    require(actor, Capability::CreateEvent)?;
    let template = catalog.get(&request.event_type)?;
    instantiate(template, request, actor, now)
}

/// Create an event from a template.
///
/// Tasks are deep-copied with fresh ids; template dependency keys are
/// resolved to the new sibling ids. Later changes to the template never
/// reach events created from it.
pub fn instantiate(
    template: &EventTemplate,
    request: &CreateEventRequest,
    actor: Actor,
    now: DateTime<Utc>,
) -> LifecycleResult<UniversalEvent> {
    TaskGraph::for_template(template)?;

    let ids: HashMap<&str, Uuid> = template
        .tasks
        .iter()
        .map(|t| (t.key.as_str(), Uuid::new_v4()))
        .collect();

    let tasks = template
        .tasks
        .iter()
        .enumerate()
        .map(|(position, t)| -> LifecycleResult<EventTask> {
            // Keys were resolved by the graph check above.
            let dependencies: Vec<Uuid> = t
                .depends_on
                .iter()
                .filter_map(|key| ids.get(key.as_str()).copied())
                .collect();
            let status = if dependencies.is_empty() {
                TaskStatus::Available
            } else {
                TaskStatus::Locked
            };
            let due_date = match t.due_offset_minutes {
                Some(minutes) => Some(
                    Duration::try_minutes(minutes)
                        .and_then(|offset| request.scheduled_at.checked_add_signed(offset))
                        .ok_or(LifecycleError::ScheduleOutOfRange(request.scheduled_at))?,
                ),
                None => None,
            };
            Ok(EventTask {
                id: ids[t.key.as_str()],
                key: t.key.clone(),
                title: t.title.clone(),
                description: t.description.clone(),
                assigned_role: t.assigned_role,
                status,
                dependencies,
                is_required: t.is_required,
                due_date,
                position: position as u32,
                completion: None,
            })
        })
        .collect::<LifecycleResult<Vec<EventTask>>>()?;

    Ok(UniversalEvent {
        id: Uuid::new_v4(),
        event_type: template.id.clone(),
        title: request
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| template.name.clone()),
        description: request.description.clone(),
        scheduled_at: request.scheduled_at,
        duration_minutes: request.duration_minutes.or(template.default_duration_minutes),
        status: EventStatus::Scheduled,
        priority: request.priority.unwrap_or(template.default_priority),
        category: template.category,
        tasks,
        assigned_users: request.assigned_users.clone(),
        property_id: request.property_id,
        unit_id: request.unit_id,
        metadata: request
            .metadata
            .clone()
            .unwrap_or_else(|| serde_json::json!({})),
        rescheduled_count: 0,
        follow_ups: Vec::new(),
        cancellation: None,
        created_by: actor.user_id,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventCategory, EventPriority, Role, TaskTemplate};
    use crate::lifecycle::LifecycleError;
    use chrono::TimeZone;

    fn request(event_type: &str) -> CreateEventRequest {
        CreateEventRequest {
            event_type: event_type.to_string(),
            title: None,
            description: None,
            scheduled_at: Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap(),
            duration_minutes: None,
            priority: None,
            assigned_users: Vec::new(),
            property_id: None,
            unit_id: None,
            metadata: None,
        }
    }

    fn operator() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Operator)
    }

    #[test]
    fn work_order_gates_diagnose_on_submission() {
        let catalog = TemplateCatalog::builtin();
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let event = create_event(&catalog, &request("work-order"), operator(), now).unwrap();

        assert_eq!(event.status, EventStatus::Scheduled);
        assert_eq!(event.rescheduled_count, 0);
        assert!(event.follow_ups.is_empty());
        assert_eq!(event.title, "Work Order");

        let by_key = |key: &str| event.tasks.iter().find(|t| t.key == key).unwrap();
        let submit = by_key("submit-with-photos");
        let diagnose = by_key("diagnose");
        assert_eq!(submit.status, TaskStatus::Available);
        assert_eq!(submit.assigned_role, Role::Resident);
        assert_eq!(diagnose.status, TaskStatus::Locked);
        assert_eq!(diagnose.dependencies, vec![submit.id]);
        assert!(event.tasks.iter().all(|t| t.completion.is_none()));
    }

    #[test]
    fn missing_template_is_reported() {
        let catalog = TemplateCatalog::builtin();
        let err = create_event(&catalog, &request("barbecue"), operator(), Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::TemplateNotFound("barbecue".to_string()));
    }

    #[test]
    fn due_dates_past_the_calendar_range_are_rejected() {
        let catalog = TemplateCatalog::builtin();
        let mut far = request("move-in");
        far.scheduled_at = DateTime::<Utc>::MAX_UTC - chrono::Duration::hours(1);
        let err = create_event(&catalog, &far, operator(), Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::ScheduleOutOfRange(far.scheduled_at));
    }

    #[test]
    fn residents_cannot_create_events() {
        let catalog = TemplateCatalog::builtin();
        let resident = Actor::new(Uuid::new_v4(), Role::Resident);
        let err = create_event(&catalog, &request("tour"), resident, Utc::now()).unwrap_err();
        assert!(matches!(err, LifecycleError::MissingCapability { .. }));
    }

    #[test]
    fn template_changes_do_not_reach_existing_events() {
        let mut template = EventTemplate {
            id: "custom".to_string(),
            name: "Custom".to_string(),
            category: EventCategory::Maintenance,
            default_priority: EventPriority::High,
            default_duration_minutes: Some(30),
            tasks: vec![TaskTemplate::new("only", "Only task", Role::Maintenance).due_in(60)],
        };
        let event = instantiate(&template, &request("custom"), operator(), Utc::now()).unwrap();

        template.tasks[0].title = "Renamed".to_string();
        template.tasks.push(TaskTemplate::new("extra", "Extra", Role::Operator));

        assert_eq!(event.tasks.len(), 1);
        assert_eq!(event.tasks[0].title, "Only task");
        assert_eq!(event.priority, EventPriority::High);
        assert_eq!(
            event.tasks[0].due_date,
            Some(Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap())
        );
    }
}
