//! Notification routes
//!
//! In-app notifications raised by event and task changes.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::notifications::{NotificationResponse, UnreadCountResponse};
use crate::error::ApiError;

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    #[sqlx(rename = "type")]
    notification_type: String,
    title: String,
    message: Option<String>,
    data: serde_json::Value,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationResponse {
    fn from(r: NotificationRow) -> Self {
        Self {
            id: r.id,
            notification_type: r.notification_type,
            title: r.title,
            message: r.message,
            data: r.data,
            is_read: r.is_read,
            read_at: r.read_at,
            created_at: r.created_at,
        }
    }
}

/// Query params for GET /notifications
#[derive(Debug, Deserialize, Default)]
pub struct NotificationListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub unread_only: Option<bool>,
    #[serde(default)]
    pub notification_type: Option<String>,
}

/// GET /notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NotificationListQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db()?;
    let user_id = auth.user_id();
    let page = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    let unread_only = query.unread_only.unwrap_or(false);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM notifications
        WHERE user_id = $1
        AND ($2::bool = false OR is_read = false)
        AND ($3::text IS NULL OR type = $3)
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(&query.notification_type)
    .fetch_one(db)
    .await?;

    let rows = sqlx::query_as::<_, NotificationRow>(
        r#"
        SELECT id, type, title, message, data, is_read, read_at, created_at
        FROM notifications
        WHERE user_id = $1
        AND ($2::bool = false OR is_read = false)
        AND ($3::text IS NULL OR type = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(&query.notification_type)
    .bind(page.limit() as i64)
    .bind(page.offset() as i64)
    .fetch_all(db)
    .await?;

    let data: Vec<NotificationResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Paginated::new(data, &page, total.max(0) as u64))
}

/// GET /notifications/unread-count
pub async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
    )
    .bind(auth.user_id())
    .fetch_one(state.db()?)
    .await?;

    Ok(Json(UnreadCountResponse { count }))
}

/// PUT /notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db()?;
    let user_id = auth.user_id();

    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET is_read = true, read_at = NOW()
        WHERE id = $1 AND user_id = $2 AND is_read = false
        "#,
    )
    .bind(notification_id)
    .bind(user_id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM notifications WHERE id = $1 AND user_id = $2)",
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_one(db)
        .await?;

        if !exists {
            return Err(ApiError::not_found("Notification not found"));
        }
        // Already read
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// PUT /notifications/read-all
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET is_read = true, read_at = NOW()
        WHERE user_id = $1 AND is_read = false
        "#,
    )
    .bind(auth.user_id())
    .execute(state.db()?)
    .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "marked_count": result.rows_affected()
    })))
}
