//! Revoked token registry
//!
//! Entries are keyed by `jti` and carry the Unix second after which the token
//! could not be used anyway, so they can be purged.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::ServiceResult;

#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Revoke `jti` until `expires_at`. Returns `false` if it was already revoked.
    async fn revoke(&self, jti: &str, expires_at: i64) -> ServiceResult<bool>;

    async fn is_revoked(&self, jti: &str) -> ServiceResult<bool>;

    /// Drop entries whose `expires_at` is before `now`. Returns the number removed.
    async fn purge_expired(&self, now: i64) -> ServiceResult<u64>;
}

/// In-process blacklist
#[derive(Default)]
pub struct MemoryTokenBlacklist {
    entries: DashMap<String, i64>,
}

impl MemoryTokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlacklist for MemoryTokenBlacklist {
    async fn revoke(&self, jti: &str, expires_at: i64) -> ServiceResult<bool> {
        match self.entries.entry(jti.to_owned()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn is_revoked(&self, jti: &str) -> ServiceResult<bool> {
        Ok(self.entries.contains_key(jti))
    }

    async fn purge_expired(&self, now: i64) -> ServiceResult<u64> {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at >= now);
        Ok((before - self.entries.len()) as u64)
    }
}
