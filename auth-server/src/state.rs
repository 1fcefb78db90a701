//! Application state

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::blacklist::{MemoryTokenBlacklist, TokenBlacklist};
use crate::auth::jwt::{JwtConfig, JwtService};
use crate::auth::rate_limit::{RateLimiter, RateLimits};
use crate::config::Config;
use crate::db::{MemoryUserStore, PgTokenBlacklist, PgUserStore, UserStore};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// User accounts
    pub users: Arc<dyn UserStore>,
    /// Token authority (owns the blacklist)
    pub jwt: Arc<JwtService>,
    /// Rate limiter for login/registration routes
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn from_parts(
        users: Arc<dyn UserStore>,
        blacklist: Arc<dyn TokenBlacklist>,
        jwt: JwtConfig,
        limits: RateLimits,
    ) -> Self {
        Self {
            users,
            jwt: Arc::new(JwtService::new(jwt, blacklist)),
            rate_limiter: RateLimiter::new(limits),
        }
    }

    /// State backed by in-process stores. Nothing is persisted.
    pub fn in_memory(jwt: JwtConfig, limits: RateLimits) -> Self {
        Self::from_parts(
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryTokenBlacklist::new()),
            jwt,
            limits,
        )
    }

    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let Some(database_url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set, using in-memory stores; data is lost on restart");
            return Ok(Self::in_memory(config.jwt.clone(), config.rate_limits));
        };

        let pool = PgPool::connect(database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");

        Ok(Self::from_parts(
            Arc::new(PgUserStore::new(pool.clone())),
            Arc::new(PgTokenBlacklist::new(pool)),
            config.jwt.clone(),
            config.rate_limits,
        ))
    }
}
