//! Revoked token table

use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::blacklist::TokenBlacklist;
use crate::error::ServiceResult;

/// PostgreSQL-backed blacklist, shared by every server instance on the database
#[derive(Clone)]
pub struct PgTokenBlacklist {
    pool: PgPool,
}

impl PgTokenBlacklist {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenBlacklist for PgTokenBlacklist {
    async fn revoke(&self, jti: &str, expires_at: i64) -> ServiceResult<bool> {
        let result = sqlx::query(
            "INSERT INTO revoked_tokens (jti, expires_at) VALUES ($1, $2)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_revoked(&self, jti: &str) -> ServiceResult<bool> {
        let revoked: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;
        Ok(revoked)
    }

    async fn purge_expired(&self, now: i64) -> ServiceResult<u64> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
