//! Request authentication extractors
//!
//! The caller's identity is handed to handlers as an explicit argument:
//! [`AuthSession`] for routes that need a currently valid token,
//! [`BearerToken`] for `refresh`, which judges expiry itself.

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::error::AppError;

use super::jwt::{Claims, JwtService};
use crate::state::AppState;

/// Authenticated caller, built from a valid, non-revoked bearer token
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub claims: Claims,
}

impl AuthSession {
    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }
}

/// Raw bearer token, not yet validated
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Missing header is "not authenticated"; a header that is not a bearer token is "invalid"
fn bearer_from_parts(parts: &Parts) -> Result<String, AppError> {
    let auth_header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match auth_header {
        Some(header) => JwtService::extract_from_header(header)
            .map(str::to_owned)
            .ok_or_else(|| AppError::invalid_token("Invalid authorization header")),
        None => {
            tracing::debug!(uri = %parts.uri, "Missing Authorization header");
            Err(AppError::not_authenticated())
        }
    }
}

impl FromRequestParts<AppState> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        bearer_from_parts(parts).map(BearerToken)
    }
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<AuthSession>() {
            return Ok(session.clone());
        }

        let token = bearer_from_parts(parts)?;

        match state.jwt.authenticate(&token).await {
            Ok(claims) => {
                let session = AuthSession { claims };
                parts.extensions.insert(session.clone());
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, uri = %parts.uri, "Token rejected");
                Err(e.into())
            }
        }
    }
}
