use super::Claims;
use crate::domain::Role;
use crate::lifecycle::Actor;
use uuid::Uuid;

/// Authenticated user context extracted from JWT
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (from JWT sub claim)
    pub user_id: Uuid,

    /// User email if available
    pub email: Option<String>,

    /// Application role the user acts in
    pub role: Role,

    /// Token issuer
    pub issuer: String,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;

        Ok(Self {
            user_id,
            email: claims.email.clone(),
            role: claims.app_role(),
            issuer: claims.iss.clone(),
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}
