//! Current-user session, taken from the auth backend's bearer token.
//!
//! Core operations receive a `&Session` explicitly; nothing reads a global user.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// Claims the auth backend puts in its access tokens. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
}

impl Session {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    pub fn ensure_owner(&self, owner_id: Uuid) -> Result<(), AppError> {
        if owner_id == self.user_id {
            Ok(())
        } else {
            tracing::warn!("User {} denied access to a resource owned by {owner_id}", self.user_id);
            Err(AppError::Forbidden)
        }
    }
}

pub fn verify_token(token: &str, secret: &str, audience: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("Rejected session token: {e}");
            AppError::Unauthorized
        })
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let claims = verify_token(token, &state.config.jwt_secret, &state.config.jwt_audience)?;
        Ok(Session::new(claims.sub))
    }
}

#[cfg(test)]
pub fn mint_token(user_id: Uuid, secret: &str, audience: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = serde_json::json!({
        "sub": user_id,
        "aud": audience,
        "exp": chrono::Utc::now().timestamp() + 3600,
        "role": "authenticated",
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("token encodes")
}
