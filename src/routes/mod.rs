pub mod events;
pub mod health;
pub mod me;
pub mod notifications;
pub mod stamps;
pub mod tasks;
pub mod templates;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Protected routes
        .route("/me", get(me::get_me))
        // Template catalog
        .route("/templates", get(templates::list_templates))
        .route("/templates/:template_id", get(templates::get_template))
        // Events
        .route(
            "/events",
            post(events::create_event).get(events::list_events),
        )
        .route("/events/:event_id", get(events::get_event))
        .route("/events/:event_id/reschedule", post(events::reschedule_event))
        .route("/events/:event_id/cancel", post(events::cancel_event))
        .route("/events/:event_id/follow-ups", post(events::add_follow_up))
        // Tasks (nested under events)
        .route(
            "/events/:event_id/tasks/:task_id/start",
            post(tasks::start_task),
        )
        .route(
            "/events/:event_id/tasks/:task_id/complete",
            post(tasks::complete_task),
        )
        .route(
            "/events/:event_id/tasks/:task_id/undo",
            post(tasks::undo_task),
        )
        // Completion stamps
        .route("/events/:event_id/stamps", get(stamps::list_event_stamps))
        .route("/stamps", get(stamps::list_stamps_by_date))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/unread-count",
            get(notifications::get_unread_count),
        )
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route(
            "/notifications/:id/read",
            put(notifications::mark_notification_read),
        )
}
