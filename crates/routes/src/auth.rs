//! JWT authentication.
//!
//! Registration/login live in a separate identity service; this crate only
//! verifies bearer tokens and extracts the caller's identity and role.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::errors::AppError;

fn get_jwt_secret() -> Vec<u8> {
    std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "routeline-dev-secret-change-in-production".to_string())
        .into_bytes()
}

/// Caller role carried in the token. Admins bypass ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user id
    #[serde(default)]
    pub role: Role,
    pub exp: i64, // expiration timestamp
    pub iat: i64, // issued at
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Mint a token for a user id. Used by the identity service and by tests.
pub fn create_token(user_id: Uuid, role: Role) -> Result<String, AppError> {
    let now = OffsetDateTime::now_utc();
    let exp = now + Duration::days(7);

    let claims = Claims {
        sub: user_id,
        role,
        exp: exp.unix_timestamp(),
        iat: now.unix_timestamp(),
    };

    let secret = get_jwt_secret();
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&secret),
    )
    .map_err(|_| AppError::Internal)
}

pub fn verify_token(token: &str) -> Result<Claims, AppError> {
    let secret = get_jwt_secret();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(&secret),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;
    Ok(token_data.claims)
}

// Extractor for authenticated user
pub struct AuthUser(pub Claims);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        let claims = verify_token(token)?;
        Ok(AuthUser(claims))
    }
}
