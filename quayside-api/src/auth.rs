use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quayside_domain::{Requester, Role};

use crate::error::AppError;
use crate::state::AppState;

/// Bearer token claims: `sub` is the user id, `role` one of
/// carrier/operator/admin. Token issuance lives in the identity service;
/// this layer only verifies and resolves the requester.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Extractor giving handlers the already-authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Requester);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Authentication("missing Authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("expected Bearer token".into()))?;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.auth.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AppError::Authentication(e.to_string()))?;

        let user_id = Uuid::parse_str(&token_data.claims.sub)
            .map_err(|_| AppError::Authentication("subject is not a user id".into()))?;
        let role: Role = token_data
            .claims
            .role
            .parse()
            .map_err(|_| AppError::Authentication("unknown role".into()))?;

        Ok(AuthUser(Requester::new(user_id, role)))
    }
}
