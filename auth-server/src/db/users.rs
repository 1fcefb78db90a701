//! User accounts

use async_trait::async_trait;
use shared::client::UserInfo;
use shared::util::now_millis;
use sqlx::PgPool;
use std::sync::LazyLock;

use crate::error::ServiceResult;
use crate::util::{hash_password, verify_password};
use crate::validation::{Constraint, Field, Violations};

/// Postgres error code for `unique_violation`
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Verified against when the email is unknown, so both misses cost one argon2 run
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("dummy-password-never-matches").ok());

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Public projection, without the password hash
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A user about to be inserted. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub now: i64,
}

impl NewUser {
    pub fn new(name: String, email: String, hashed_password: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            hashed_password,
            now: now_millis(),
        }
    }

    pub(crate) fn into_user(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            hashed_password: self.hashed_password,
            created_at: self.now,
            updated_at: self.now,
        }
    }
}

/// Taken-email error, reported the same way the registration rules report it
pub(crate) fn email_taken() -> crate::error::ServiceError {
    Violations::single(Field::Email, Constraint::Unique)
        .into_error()
        .into()
}

/// Persistence for user accounts
///
/// Emails are stored exactly as given; callers normalize them first.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with the email `Unique` violation if the email exists.
    async fn create(&self, user: NewUser) -> ServiceResult<User>;

    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>>;

    async fn email_exists(&self, email: &str) -> ServiceResult<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    /// Connectivity probe for the health endpoint
    async fn ping(&self) -> ServiceResult<()>;
}

/// Check credentials. `None` for an unknown email or a wrong password alike.
pub async fn authenticate(
    store: &dyn UserStore,
    email: &str,
    password: &str,
) -> ServiceResult<Option<User>> {
    let Some(user) = store.find_by_email(email).await? else {
        if let Some(dummy) = DUMMY_HASH.as_deref() {
            verify_password(password, dummy);
        }
        return Ok(None);
    };

    if !verify_password(password, &user.hashed_password) {
        return Ok(None);
    }

    Ok(Some(user))
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> ServiceResult<User> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, email, hashed_password, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(user.now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user.into_user()),
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) =>
            {
                Err(email_taken())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn email_exists(&self, email: &str) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn ping(&self) -> ServiceResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryUserStore;

    async fn store_with_ada() -> MemoryUserStore {
        let store = MemoryUserStore::new();
        let hashed = hash_password("secret1").unwrap();
        store
            .create(NewUser::new(
                "Ada".into(),
                "ada@example.com".into(),
                hashed,
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_authenticate() {
        let store = store_with_ada().await;

        let user = authenticate(&store, "ada@example.com", "secret1")
            .await
            .unwrap()
            .expect("valid credentials");
        assert_eq!(user.name, "Ada");

        assert!(
            authenticate(&store, "ada@example.com", "wrong")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            authenticate(&store, "nobody@example.com", "secret1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_dummy_hash_is_a_real_phc_string() {
        let dummy = DUMMY_HASH.as_deref().expect("dummy hash");
        assert!(dummy.starts_with("$argon2"));
        assert!(!verify_password("secret1", dummy));
    }

    #[test]
    fn test_info_omits_hash() {
        let user = NewUser::new("Ada".into(), "ada@example.com".into(), "$argon2id$x".into())
            .into_user();
        let json = serde_json::to_value(user.to_info()).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["email"], "ada@example.com");
        assert_eq!(json["created_at"], json["updated_at"]);
    }
}
