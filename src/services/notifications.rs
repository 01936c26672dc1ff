//! Notification service
//!
//! Lifecycle changes fan out to the users involved in an event. Delivery is
//! fire-and-forget: a failed insert is logged and never fails the operation
//! that caused it.

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::notifications::{NotificationType, OutgoingNotification};
use crate::domain::{EventTask, UniversalEvent};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &OutgoingNotification) -> anyhow::Result<()>;
}

/// Create a notification for a user
pub async fn create_notification(
    db: &PgPool,
    user_id: Uuid,
    notification_type: NotificationType,
    title: &str,
    message: Option<&str>,
    data: Option<serde_json::Value>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let type_str = notification_type.to_string();
    let data = data.unwrap_or(serde_json::json!({}));

    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, type, title, message, data)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&type_str)
    .bind(title)
    .bind(message)
    .bind(&data)
    .execute(db)
    .await?;

    tracing::info!(
        user_id = %user_id,
        notification_type = %type_str,
        notification_id = %id,
        "Notification created"
    );

    Ok(id)
}

/// Writes rows into the `notifications` table
pub struct PgNotificationSink {
    db: PgPool,
}

impl PgNotificationSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn deliver(&self, n: &OutgoingNotification) -> anyhow::Result<()> {
        create_notification(
            &self.db,
            n.user_id,
            n.notification_type,
            &n.title,
            n.message.as_deref(),
            Some(n.data.clone()),
        )
        .await?;
        Ok(())
    }
}

/// Logs notifications instead of storing them (memory store mode)
#[derive(Debug, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn deliver(&self, n: &OutgoingNotification) -> anyhow::Result<()> {
        tracing::info!(
            user_id = %n.user_id,
            notification_type = %n.notification_type,
            title = %n.title,
            "Notification"
        );
        Ok(())
    }
}

/// Keeps delivered notifications in memory; can be told to fail
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    delivered: Mutex<Vec<OutgoingNotification>>,
    fail: Mutex<bool>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn delivered(&self) -> Vec<OutgoingNotification> {
        self.delivered.lock().clone()
    }

    pub fn of_type(&self, notification_type: NotificationType) -> Vec<OutgoingNotification> {
        self.delivered
            .lock()
            .iter()
            .filter(|n| n.notification_type == notification_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn deliver(&self, n: &OutgoingNotification) -> anyhow::Result<()> {
        if *self.fail.lock() {
            anyhow::bail!("notification channel unavailable");
        }
        self.delivered.lock().push(n.clone());
        Ok(())
    }
}

/// Builds lifecycle notifications and hands them to a sink
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Deliver all notifications concurrently; failures are only logged.
    pub async fn dispatch(&self, notifications: Vec<OutgoingNotification>) {
        if notifications.is_empty() {
            return;
        }
        let results = join_all(notifications.iter().map(|n| self.sink.deliver(n))).await;
        for (n, result) in notifications.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(
                    user_id = %n.user_id,
                    notification_type = %n.notification_type,
                    error = %e,
                    "Failed to deliver notification"
                );
            }
        }
    }

    pub async fn event_scheduled(&self, event: &UniversalEvent, actor_id: Uuid) {
        let message = format!("Scheduled for {}", event.scheduled_at.to_rfc3339());
        self.dispatch(for_event(
            event,
            actor_id,
            NotificationType::EventScheduled,
            format!("New {}", event.title),
            Some(message),
        ))
        .await;
    }

    pub async fn task_unlocked(&self, event: &UniversalEvent, tasks: &[&EventTask], actor_id: Uuid) {
        let mut out = Vec::new();
        for task in tasks {
            out.extend(for_task(
                event,
                task,
                actor_id,
                NotificationType::TaskUnlocked,
                format!("{} is ready", task.title),
                Some(format!("Assigned to {} on {}", task.assigned_role, event.title)),
            ));
        }
        self.dispatch(out).await;
    }

    pub async fn task_completed(&self, event: &UniversalEvent, task: &EventTask, actor_id: Uuid) {
        self.dispatch(for_task(
            event,
            task,
            actor_id,
            NotificationType::TaskCompleted,
            format!("{} completed", task.title),
            None,
        ))
        .await;
    }

    pub async fn task_completion_undone(
        &self,
        event: &UniversalEvent,
        task: &EventTask,
        actor_id: Uuid,
    ) {
        self.dispatch(for_task(
            event,
            task,
            actor_id,
            NotificationType::TaskCompletionUndone,
            format!("{} reopened", task.title),
            None,
        ))
        .await;
    }

    pub async fn event_rescheduled(&self, event: &UniversalEvent, actor_id: Uuid) {
        let message = format!(
            "Moved to {} (rescheduled {} time(s))",
            event.scheduled_at.to_rfc3339(),
            event.rescheduled_count
        );
        self.dispatch(for_event(
            event,
            actor_id,
            NotificationType::EventRescheduled,
            format!("{} rescheduled", event.title),
            Some(message),
        ))
        .await;
    }

    pub async fn event_cancelled(&self, event: &UniversalEvent, actor_id: Uuid) {
        let reason = event.cancellation.as_ref().and_then(|c| c.reason.clone());
        self.dispatch(for_event(
            event,
            actor_id,
            NotificationType::EventCancelled,
            format!("{} cancelled", event.title),
            reason,
        ))
        .await;
    }

    pub async fn event_completed(&self, event: &UniversalEvent, actor_id: Uuid) {
        self.dispatch(for_event(
            event,
            actor_id,
            NotificationType::EventCompleted,
            format!("{} completed", event.title),
            None,
        ))
        .await;
    }
}

/// Everyone involved in the event except the user who caused the change
fn recipients(event: &UniversalEvent, actor_id: Uuid) -> Vec<Uuid> {
    let mut users: Vec<Uuid> = std::iter::once(event.created_by)
        .chain(event.assigned_users.iter().copied())
        .filter(|id| *id != actor_id)
        .collect();
    users.sort();
    users.dedup();
    users
}

fn for_event(
    event: &UniversalEvent,
    actor_id: Uuid,
    notification_type: NotificationType,
    title: String,
    message: Option<String>,
) -> Vec<OutgoingNotification> {
    let data = serde_json::json!({
        "event_id": event.id,
        "event_type": event.event_type,
        "scheduled_at": event.scheduled_at,
    });
    recipients(event, actor_id)
        .into_iter()
        .map(|user_id| OutgoingNotification {
            user_id,
            notification_type,
            title: title.clone(),
            message: message.clone(),
            data: data.clone(),
        })
        .collect()
}

fn for_task(
    event: &UniversalEvent,
    task: &EventTask,
    actor_id: Uuid,
    notification_type: NotificationType,
    title: String,
    message: Option<String>,
) -> Vec<OutgoingNotification> {
    let data = serde_json::json!({
        "event_id": event.id,
        "task_id": task.id,
        "task_key": task.key,
        "assigned_role": task.assigned_role,
    });
    recipients(event, actor_id)
        .into_iter()
        .map(|user_id| OutgoingNotification {
            user_id,
            notification_type,
            title: title.clone(),
            message: message.clone(),
            data: data.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventCategory, EventPriority, EventStatus};
    use chrono::Utc;

    fn event(created_by: Uuid, assigned: Vec<Uuid>) -> UniversalEvent {
        let now = Utc::now();
        UniversalEvent {
            id: Uuid::new_v4(),
            event_type: "tour".to_string(),
            title: "Unit tour".to_string(),
            description: None,
            scheduled_at: now,
            duration_minutes: Some(30),
            status: EventStatus::Scheduled,
            priority: EventPriority::Medium,
            category: EventCategory::Leasing,
            tasks: Vec::new(),
            assigned_users: assigned,
            property_id: None,
            unit_id: None,
            metadata: serde_json::json!({}),
            rescheduled_count: 0,
            follow_ups: Vec::new(),
            cancellation: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn recipients_skip_actor_and_duplicates() {
        let operator = Uuid::new_v4();
        let prospect = Uuid::new_v4();
        let event = event(operator, vec![prospect, operator, prospect]);
        assert_eq!(recipients(&event, operator), vec![prospect]);
    }

    #[tokio::test]
    async fn failed_delivery_is_swallowed() {
        let sink = Arc::new(RecordingNotificationSink::new());
        sink.set_fail(true);
        let notifier = Notifier::new(sink.clone());
        let operator = Uuid::new_v4();
        notifier
            .event_completed(&event(operator, vec![Uuid::new_v4()]), operator)
            .await;
        assert!(sink.delivered().is_empty());
    }
}
