use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::RequireAuth;
use crate::domain::{Capability, Role};

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub capabilities: &'static [Capability],
    pub issuer: String,
}

/// Current user with the role and capabilities the lifecycle grants them
pub async fn get_me(auth: RequireAuth) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: auth.user_id,
        email: auth.email.clone(),
        role: auth.role,
        capabilities: auth.role.capabilities(),
        issuer: auth.issuer.clone(),
    })
}
