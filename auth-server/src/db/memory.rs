//! In-process user store
//!
//! Used when no `DATABASE_URL` is configured (development) and by the tests.
//! Nothing survives a restart.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::users::{NewUser, User, UserStore, email_taken};
use crate::error::ServiceResult;

#[derive(Default)]
pub struct MemoryUserStore {
    /// email -> user
    by_email: DashMap<String, User>,
    /// id -> email
    ids: DashMap<String, String>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> ServiceResult<User> {
        // The entry guard makes the uniqueness check and insert one step
        match self.by_email.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(email_taken()),
            Entry::Vacant(slot) => {
                let user = user.into_user();
                self.ids.insert(user.id.clone(), user.email.clone());
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<User>> {
        let Some(email) = self.ids.get(id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        Ok(self.by_email.get(&email).map(|u| u.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        Ok(self.by_email.get(email).map(|u| u.value().clone()))
    }

    async fn email_exists(&self, email: &str) -> ServiceResult<bool> {
        Ok(self.by_email.contains_key(email))
    }

    async fn ping(&self) -> ServiceResult<()> {
        Ok(())
    }
}
