use serde::{Deserialize, Serialize};

use crate::domain::Role;

/// JWT claims structure for Supabase tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Audience
    pub aud: String,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp) - optional
    #[serde(default)]
    pub nbf: Option<i64>,

    /// User email - optional
    #[serde(default)]
    pub email: Option<String>,

    /// Postgres role Supabase runs queries as (`authenticated`), not the
    /// application role
    #[serde(default)]
    pub role: Option<String>,

    /// App metadata from Supabase - optional
    #[serde(default)]
    pub app_metadata: Option<AppMetadata>,

    /// User metadata from Supabase - optional
    #[serde(default)]
    pub user_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppMetadata {
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub providers: Option<Vec<String>>,

    /// Application role, set server-side
    #[serde(default)]
    pub role: Option<String>,
}

impl Claims {
    /// Application role from `app_metadata.role`, falling back to
    /// `user_metadata.role`. Missing or unknown roles resolve to the least
    /// privileged role.
    pub fn app_role(&self) -> Role {
        let from_app = self.app_metadata.as_ref().and_then(|m| m.role.as_deref());
        let from_user = self
            .user_metadata
            .as_ref()
            .and_then(|m| m.get("role"))
            .and_then(|r| r.as_str());

        match from_app.or(from_user) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(sub = %self.sub, error = %e, "Unknown role claim");
                Role::Prospect
            }),
            None => Role::Prospect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(app_role: Option<&str>, user_metadata: Option<serde_json::Value>) -> Claims {
        Claims {
            sub: "5c1d0f7e-2b7a-4c52-9d2b-0a6f6f4a9d11".to_string(),
            aud: "authenticated".to_string(),
            iss: "https://example.supabase.co/auth/v1".to_string(),
            iat: 0,
            exp: 0,
            nbf: None,
            email: None,
            role: Some("authenticated".to_string()),
            app_metadata: Some(AppMetadata {
                role: app_role.map(str::to_string),
                ..AppMetadata::default()
            }),
            user_metadata,
        }
    }

    #[test]
    fn app_metadata_wins_over_user_metadata() {
        let c = claims(
            Some("maintenance"),
            Some(serde_json::json!({ "role": "admin" })),
        );
        assert_eq!(c.app_role(), Role::Maintenance);
    }

    #[test]
    fn falls_back_to_user_metadata() {
        let c = claims(None, Some(serde_json::json!({ "role": "tenant" })));
        assert_eq!(c.app_role(), Role::Resident);
    }

    #[test]
    fn missing_or_unknown_role_is_least_privileged() {
        assert_eq!(claims(None, None).app_role(), Role::Prospect);
        assert_eq!(claims(Some("superuser"), None).app_role(), Role::Prospect);
    }
}
