// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider adapter: resolves the calling principal from the
//! session credential, and the single authorization check used by every
//! operation.

use crate::error::{AppError, Result};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cookie set by the identity provider's frontend SDK.
pub const SESSION_COOKIE: &str = "volunteer_session";

/// Role claimed by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Volunteer,
}

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Join, leave, sync and delete one's own account
    Participate,
    /// Submit volunteer-hour reports and read audit records
    SubmitReports,
    /// Create and edit activities
    ManageActivities,
}

impl Role {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Participate => true,
            Capability::SubmitReports | Capability::ManageActivities => {
                matches!(self, Role::Admin | Role::Manager)
            }
        }
    }
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity provider user ID)
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated caller extracted from the session credential.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
}

impl Principal {
    /// Checked on every call; nothing is cached between requests.
    pub fn authorize(&self, capability: Capability) -> Result<()> {
        if self.user_id.is_empty() {
            return Err(AppError::Unauthenticated);
        }
        if !self.role.allows(capability) {
            tracing::warn!(
                user_id = %self.user_id,
                role = ?self.role,
                capability = ?capability,
                "Authorization denied"
            );
            return Err(AppError::Forbidden(format!("{:?}", capability)));
        }
        Ok(())
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            display_name: claims.name.unwrap_or_else(|| claims.sub.clone()),
            user_id: claims.sub,
            email: claims.email,
            avatar_url: claims.picture,
            role: claims.role,
        }
    }
}

/// Verify a session token and resolve its principal.
pub fn verify_session(token: &str, signing_key: &[u8]) -> Option<Principal> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).ok()?;
    if token_data.claims.sub.is_empty() {
        return None;
    }
    Some(token_data.claims.into())
}

/// Middleware that requires a valid session credential.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(t) => t.to_string(),
            None => return Err(AppError::Unauthenticated),
        }
    };

    let principal =
        verify_session(&token, &state.config.jwt_signing_key).ok_or(AppError::InvalidToken)?;

    tracing::debug!(user_id = %principal.user_id, role = ?principal.role, "Principal resolved");
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// Create a session JWT (local development and tests; production tokens
/// come from the identity provider).
pub fn create_jwt(
    user_id: &str,
    display_name: &str,
    role: Role,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        name: Some(display_name.to_string()),
        email: None,
        picture: None,
        role,
        iat: now,
        exp: now + 24 * 60 * 60,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"unit_test_signing_key_32_bytes!!";

    #[test]
    fn test_round_trip_principal() {
        let token = create_jwt("user_1", "Болд", Role::Manager, KEY).unwrap();
        let principal = verify_session(&token, KEY).unwrap();

        assert_eq!(principal.user_id, "user_1");
        assert_eq!(principal.display_name, "Болд");
        assert_eq!(principal.role, Role::Manager);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = create_jwt("user_1", "Bold", Role::Admin, KEY).unwrap();
        assert!(verify_session(&token, b"another_key_entirely_32_bytes!!!").is_none());
    }

    #[test]
    fn test_missing_role_defaults_to_volunteer() {
        let json = r#"{"sub":"u1","exp":1,"iat":0}"#;
        let claims: Claims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.role, Role::Volunteer);
    }

    #[test]
    fn test_capabilities_by_role() {
        let volunteer = Principal {
            user_id: "u1".to_string(),
            display_name: "u1".to_string(),
            email: None,
            avatar_url: None,
            role: Role::Volunteer,
        };
        assert!(volunteer.authorize(Capability::Participate).is_ok());
        assert!(matches!(
            volunteer.authorize(Capability::SubmitReports),
            Err(AppError::Forbidden(_))
        ));

        let manager = Principal {
            role: Role::Manager,
            ..volunteer.clone()
        };
        assert!(manager.authorize(Capability::SubmitReports).is_ok());
        assert!(manager.authorize(Capability::ManageActivities).is_ok());

        let anonymous = Principal {
            user_id: String::new(),
            ..volunteer
        };
        assert!(matches!(
            anonymous.authorize(Capability::Participate),
            Err(AppError::Unauthenticated)
        ));
    }
}
