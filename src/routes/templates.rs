//! Template catalog routes (read-only)

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::error::ApiError;

/// GET /templates
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    _auth: RequireAuth,
) -> impl IntoResponse {
    DataResponse::new(state.events.templates().to_vec())
}

/// GET /templates/:template_id
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let template = state.events.template(&template_id)?;
    Ok(DataResponse::new(template.clone()))
}
