//! API routes for auth-server

pub mod auth;
pub mod health;

use crate::auth::rate_limit::{login_rate_limit, register_rate_limit};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::{Router, middleware};
use shared::error::AppError;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub type ApiResult<T> = Result<axum::Json<T>, AppError>;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Public credential routes (rate limited per IP)
    let login = Router::new()
        .route("/api/auth/login", post(auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            login_rate_limit,
        ));

    let registration = Router::new()
        .route("/api/auth/register", post(auth::register))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            register_rate_limit,
        ));

    // Bearer-token routes
    let session = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(login)
        .merge(registration)
        .merge(session)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}
