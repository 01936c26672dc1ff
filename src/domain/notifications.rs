//! Notification domain types
//!
//! In-app notifications raised by event and task lifecycle changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification type enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    // Task related
    TaskUnlocked,
    TaskCompleted,
    TaskCompletionUndone,

    // Event related
    EventScheduled,
    EventRescheduled,
    EventCancelled,
    EventCompleted,

    // System
    System,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskUnlocked => "task_unlocked",
            Self::TaskCompleted => "task_completed",
            Self::TaskCompletionUndone => "task_completion_undone",
            Self::EventScheduled => "event_scheduled",
            Self::EventRescheduled => "event_rescheduled",
            Self::EventCancelled => "event_cancelled",
            Self::EventCompleted => "event_completed",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification waiting to be delivered to one user
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingNotification {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: Option<String>,
    pub data: serde_json::Value,
}

/// Response DTO for notification
#[derive(Debug, Clone, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: Option<String>,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Unread count response
#[derive(Debug, Clone, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}
