//! Bearer token verification.
//!
//! Sign-up, login and password flows belong to the hosted identity
//! provider. This service only checks the HS256 access tokens it issues:
//! `sub` is the user's UUID and `role` separates ordinary users from the
//! back-office service role. Service tokens may omit `sub`.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::routes::AppState;

pub const SERVICE_ROLE: &str = "service_role";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<Uuid>,
    pub exp: usize,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Decoding key plus validation rules, built once at startup.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.jwt_audience.as_str()]);
        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(e.to_string()))
    }
}

/// Authenticated caller, extracted from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl AuthUser {
    /// Users need a subject; a service token without one acts as the nil id
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        let is_service = claims.role.as_deref() == Some(SERVICE_ROLE);
        let id = match claims.sub {
            Some(id) => id,
            None if is_service => Uuid::nil(),
            None => return Err(AppError::Unauthorized("token has no subject".into())),
        };
        Ok(AuthUser {
            id,
            email: claims.email,
            role: claims.role,
        })
    }

    pub fn is_service(&self) -> bool {
        self.role.as_deref() == Some(SERVICE_ROLE)
    }

    pub fn require_service(&self) -> Result<(), AppError> {
        if self.is_service() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".into()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("malformed Authorization header".into()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("expected a Bearer token".into()))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.jwt.verify(token)?;
        AuthUser::from_claims(claims)
    }
}

#[cfg(test)]
pub(crate) fn issue_test_token(config: &AuthConfig, user_id: Uuid, role: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: Some(user_id),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        aud: Some(config.jwt_audience.clone()),
        email: Some("player@example.com".to_string()),
        role: Some(role.to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .unwrap()
}
