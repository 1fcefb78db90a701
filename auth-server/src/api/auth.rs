//! Authentication endpoints: register, login, me, refresh, logout

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use shared::client::{
    LoginRequest, RegisterRequest, StatusResponse, TOKEN_TYPE_BEARER, TokenResponse, UserInfo,
};
use shared::error::AppError;

use crate::auth::jwt::IssuedToken;
use crate::auth::{AuthSession, BearerToken};
use crate::db::{self, NewUser, User};
use crate::state::AppState;
use crate::util::hash_password;
use crate::validation::{normalize_email, validate_registration};

use super::ApiResult;

/// Unwrap a JSON body, reporting a malformed one as 400
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(req)| req)
        .map_err(|e| AppError::invalid_request(e.body_text()))
}

fn token_response(state: &AppState, issued: IssuedToken, user: &User) -> TokenResponse {
    TokenResponse {
        access_token: issued.token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        user: user.to_info(),
        expires_in: state.jwt.ttl_secs(),
    }
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StatusResponse<UserInfo>>), AppError> {
    let req = json_body(body)?;
    let valid = validate_registration(&req, state.users.as_ref()).await?;

    let hashed = hash_password(&valid.password).map_err(|e| {
        tracing::error!("Password hashing failed: {e}");
        AppError::internal("Failed to hash password")
    })?;

    let user = state
        .users
        .create(NewUser::new(valid.name, valid.email, hashed))
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(StatusResponse::success(
            "User successfully registered",
            user.to_info(),
        )),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<TokenResponse> {
    let req = json_body(body)?;
    let email = normalize_email(&req.email);

    let Some(user) = db::authenticate(state.users.as_ref(), &email, &req.password).await? else {
        tracing::warn!(email = %email, "Login failed");
        return Err(AppError::invalid_credentials());
    };

    let issued = state.jwt.issue(&user.id, &user.email)?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(token_response(&state, issued, &user)))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, session: AuthSession) -> ApiResult<UserInfo> {
    let user = state
        .users
        .find_by_id(session.user_id())
        .await?
        .ok_or_else(|| {
            tracing::warn!(user_id = %session.user_id(), "Token subject no longer exists");
            AppError::not_authenticated()
        })?;

    Ok(Json(user.to_info()))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> ApiResult<TokenResponse> {
    let issued = state.jwt.refresh(&token).await.map_err(|e| {
        tracing::warn!(error = %e, "Token refresh rejected");
        AppError::from(e)
    })?;

    let user = state
        .users
        .find_by_id(&issued.claims.sub)
        .await?
        .ok_or_else(AppError::not_authenticated)?;

    tracing::info!(user_id = %user.id, "Token refreshed");

    Ok(Json(token_response(&state, issued, &user)))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    session: AuthSession,
) -> ApiResult<StatusResponse<()>> {
    state.jwt.invalidate(&session.claims).await?;

    tracing::info!(user_id = %session.user_id(), "User logged out");

    Ok(Json(StatusResponse::ok("Successfully logged out")))
}
