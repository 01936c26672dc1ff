//! Completion stamp routes
//!
//! Stamps are served with the day lock applied; `can_undo` is only true on
//! the calendar day the task was completed.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::StampQuery;
use crate::error::ApiError;

/// GET /events/:event_id/stamps
pub async fn list_event_stamps(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let stamps = state.events.event_stamps(auth.actor(), event_id).await?;
    Ok(DataResponse::new(stamps))
}

/// GET /stamps?date=YYYY-MM-DD
pub async fn list_stamps_by_date(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StampQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let stamps = state.events.stamps_on(auth.actor(), query.date).await?;
    Ok(DataResponse::new(stamps))
}
