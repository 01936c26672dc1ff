//! Task action routes
//!
//! Tasks are only reachable through their event.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::CompleteTaskRequest;
use crate::error::ApiError;

/// POST /events/:event_id/tasks/:task_id/start
pub async fn start_task(
    State(state): State<Arc<AppState>>,
    Path((event_id, task_id)): Path<(Uuid, Uuid)>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.events.start_task(auth.actor(), event_id, task_id).await?;
    Ok(DataResponse::new(result))
}

/// POST /events/:event_id/tasks/:task_id/complete
///
/// Body is optional; `{ "notes": "..." }` attaches notes to the stamp.
pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    Path((event_id, task_id)): Path<(Uuid, Uuid)>,
    auth: RequireAuth,
    input: Option<Json<CompleteTaskRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let notes = input
        .and_then(|Json(body)| body.notes)
        .filter(|n| !n.trim().is_empty());
    let result = state
        .events
        .complete_task(auth.actor(), event_id, task_id, notes)
        .await?;
    Ok(DataResponse::new(result))
}

/// POST /events/:event_id/tasks/:task_id/undo
pub async fn undo_task(
    State(state): State<Arc<AppState>>,
    Path((event_id, task_id)): Path<(Uuid, Uuid)>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.events.undo_task(auth.actor(), event_id, task_id).await?;
    Ok(DataResponse::new(result))
}
