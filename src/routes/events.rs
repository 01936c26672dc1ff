//! Calendar event routes
//!
//! Create, list, read, reschedule, cancel and annotate events.

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
use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{
    AddFollowUpRequest, CancelEventRequest, CreateEventRequest, EventFilter, EventStatus,
    RescheduleEventRequest,
};
use crate::error::ApiError;

/// Query params for GET /events
#[derive(Debug, Deserialize, Default)]
pub struct EventListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub property_id: Option<Uuid>,
    pub event_type: Option<String>,
    /// Includes `overdue`
    pub status: Option<EventStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub assigned_user: Option<Uuid>,
}

impl EventListQuery {
    fn split(self) -> (EventFilter, PaginationParams) {
        (
            EventFilter {
                property_id: self.property_id,
                event_type: self.event_type,
                status: self.status,
                from: self.from,
                to: self.to,
                assigned_user: self.assigned_user,
            },
            PaginationParams {
                page: self.page,
                per_page: self.per_page,
            },
        )
    }
}

/// POST /events
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(input): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if input.event_type.trim().is_empty() {
        return Err(ApiError::bad_request("event_type is required"));
    }
    if input.duration_minutes.is_some_and(|d| d <= 0) {
        return Err(ApiError::bad_request("duration_minutes must be positive"));
    }

    let event = state.events.create(auth.actor(), &input).await?;
    Ok(Created(DataResponse::new(event)))
}

/// GET /events
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventListQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let (filter, page) = query.split();
    let (data, total) = state.events.list(auth.actor(), &filter, &page).await?;
    Ok(Paginated::new(data, &page, total))
}

/// GET /events/:event_id
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let event = state.events.get(auth.actor(), event_id).await?;
    Ok(DataResponse::new(event))
}

/// POST /events/:event_id/reschedule
pub async fn reschedule_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
    auth: RequireAuth,
    Json(input): Json<RescheduleEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if input.duration_minutes.is_some_and(|d| d <= 0) {
        return Err(ApiError::bad_request("duration_minutes must be positive"));
    }
    let event = state.events.reschedule(auth.actor(), event_id, &input).await?;
    Ok(DataResponse::new(event))
}

/// POST /events/:event_id/cancel
pub async fn cancel_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
    auth: RequireAuth,
    Json(input): Json<CancelEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reason = input.reason.filter(|r| !r.trim().is_empty());
    let event = state.events.cancel(auth.actor(), event_id, reason).await?;
    Ok(DataResponse::new(event))
}

/// POST /events/:event_id/follow-ups
pub async fn add_follow_up(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
    auth: RequireAuth,
    Json(input): Json<AddFollowUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let note = input.note.trim().to_string();
    if note.is_empty() {
        return Err(ApiError::bad_request("note is required"));
    }
    let follow_up = state.events.add_follow_up(auth.actor(), event_id, note).await?;
    Ok(Created(DataResponse::new(follow_up)))
}
