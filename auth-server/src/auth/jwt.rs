//! Token authority
//!
//! Issues, validates, refreshes and revokes HS256 access tokens.
//!
//! Every token carries `orig_iat`, the issue time of the first token in its
//! refresh chain. A chain may be refreshed until `orig_iat + refresh_ttl`,
//! even after the current token's `exp`. Each refresh and each logout puts
//! the presented `jti` on the [`TokenBlacklist`] until the token can neither
//! authenticate nor refresh: the later of its `exp` (plus leeway) and that
//! deadline.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use shared::error::AppError;
use shared::util::now_secs;
use thiserror::Error;

use super::blacklist::TokenBlacklist;
use crate::error::ServiceError;

/// Token authority settings
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HMAC secret
    pub secret: String,
    /// Access token lifetime (seconds)
    pub ttl_secs: i64,
    /// Refresh window measured from the chain's first issue (seconds)
    pub refresh_ttl_secs: i64,
    /// `iss` claim written and required
    pub issuer: String,
    /// Clock skew tolerated on `exp` (seconds)
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("issuer", &self.issuer)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "dev-JWT_SECRET-not-for-production".to_string(),
            ttl_secs: 60 * 60,
            refresh_ttl_secs: 14 * 24 * 60 * 60,
            issuer: "auth-server".to_string(),
            leeway_secs: 0,
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// User email at issue time
    pub email: String,
    /// Unique token ID (blacklist key)
    pub jti: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    /// Issue time of the first token of the refresh chain (Unix seconds)
    pub orig_iat: i64,
    /// Issuer
    pub iss: String,
}

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    ExpiredToken,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token has been revoked")]
    Revoked,

    #[error("refresh window has closed")]
    RefreshExpired,

    #[error("token generation failed: {0}")]
    GenerationFailed(String),

    #[error("token blacklist unavailable: {0}")]
    Blacklist(#[from] ServiceError),
}

impl From<JwtError> for AppError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::ExpiredToken => AppError::token_expired(),
            JwtError::RefreshExpired => AppError::session_expired(),
            JwtError::GenerationFailed(msg) => AppError::internal(msg),
            JwtError::Blacklist(err) => err.into(),
            JwtError::InvalidToken(_) | JwtError::InvalidSignature | JwtError::Revoked => {
                AppError::invalid_token("Token is invalid")
            }
        }
    }
}

/// A freshly signed token and the claims inside it
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// JWT token service
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    blacklist: Arc<dyn TokenBlacklist>,
}

impl JwtService {
    pub fn new(config: JwtConfig, blacklist: Arc<dyn TokenBlacklist>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
            blacklist,
        }
    }

    /// Access token lifetime in seconds (`expires_in`)
    pub fn ttl_secs(&self) -> i64 {
        self.config.ttl_secs
    }

    pub fn blacklist(&self) -> &Arc<dyn TokenBlacklist> {
        &self.blacklist
    }

    /// Issue a token starting a new refresh chain
    pub fn issue(&self, user_id: &str, email: &str) -> Result<IssuedToken, JwtError> {
        let now = now_secs();
        self.issue_at(user_id, email, now, now)
    }

    pub(crate) fn issue_at(
        &self,
        user_id: &str,
        email: &str,
        iat: i64,
        orig_iat: i64,
    ) -> Result<IssuedToken, JwtError> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat,
            exp: iat + self.config.ttl_secs,
            orig_iat,
            iss: self.config.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }

    /// Verify signature, issuer and expiry, then check the blacklist
    pub async fn authenticate(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.decode(token, true)?;

        if self.blacklist.is_revoked(&claims.jti).await? {
            return Err(JwtError::Revoked);
        }

        Ok(claims)
    }

    /// Exchange a token for a new one in the same refresh chain
    ///
    /// Accepts an expired token as long as the chain's refresh window is
    /// open. The presented token is revoked; a token can be refreshed once.
    pub async fn refresh(&self, token: &str) -> Result<IssuedToken, JwtError> {
        let claims = self.decode(token, false)?;
        let now = now_secs();
        if now > self.refresh_deadline(&claims) {
            return Err(JwtError::RefreshExpired);
        }

        // revoke() is the single point of truth: a concurrent refresh with
        // the same token loses here
        if !self
            .blacklist
            .revoke(&claims.jti, self.revoked_until(&claims))
            .await?
        {
            return Err(JwtError::Revoked);
        }

        self.issue_at(&claims.sub, &claims.email, now, claims.orig_iat)
    }

    /// Revoke a token so it can neither authenticate nor refresh
    pub async fn invalidate(&self, claims: &Claims) -> Result<(), JwtError> {
        self.blacklist
            .revoke(&claims.jti, self.revoked_until(claims))
            .await?;
        Ok(())
    }

    /// End of the refresh window of the chain `claims` belongs to
    pub fn refresh_deadline(&self, claims: &Claims) -> i64 {
        claims.orig_iat + self.config.refresh_ttl_secs
    }

    /// Last second at which the token could still be used for anything.
    /// A revocation must outlive it.
    pub fn revoked_until(&self, claims: &Claims) -> i64 {
        let leeway = i64::try_from(self.config.leeway_secs).unwrap_or(i64::MAX);
        claims
            .exp
            .saturating_add(leeway)
            .max(self.refresh_deadline(claims))
    }

    fn decode(&self, token: &str, check_exp: bool) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);
        validation.leeway = self.config.leeway_secs;
        validation.validate_exp = check_exp;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    /// Extract token from the Authorization header value.
    /// The scheme is matched case-insensitively.
    pub fn extract_from_header(header: &str) -> Option<&str> {
        let (scheme, token) = header.trim().split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        Some(token.trim()).filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::blacklist::MemoryTokenBlacklist;

    fn service() -> JwtService {
        JwtService::new(
            JwtConfig::default(),
            Arc::new(MemoryTokenBlacklist::new()),
        )
    }

    #[tokio::test]
    async fn test_issue_and_authenticate() {
        let jwt = service();
        let issued = jwt.issue("user-1", "ada@example.com").unwrap();

        let claims = jwt.authenticate(&issued.token).await.unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.exp - claims.iat, jwt.ttl_secs());
        assert_eq!(claims.orig_iat, claims.iat);
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let jwt = service();
        let past = now_secs() - 2 * 60 * 60;
        let issued = jwt.issue_at("user-1", "ada@example.com", past, past).unwrap();

        let err = jwt.authenticate(&issued.token).await.unwrap_err();
        assert!(matches!(err, JwtError::ExpiredToken));
    }

    #[tokio::test]
    async fn test_tampered_token_is_rejected() {
        let jwt = service();
        let other = JwtService::new(
            JwtConfig {
                secret: "another-secret-another-secret-12".into(),
                ..JwtConfig::default()
            },
            Arc::new(MemoryTokenBlacklist::new()),
        );
        let issued = other.issue("user-1", "ada@example.com").unwrap();

        let err = jwt.authenticate(&issued.token).await.unwrap_err();
        assert!(matches!(err, JwtError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_foreign_issuer_is_rejected() {
        let jwt = service();
        let other = JwtService::new(
            JwtConfig {
                issuer: "someone-else".into(),
                ..JwtConfig::default()
            },
            Arc::new(MemoryTokenBlacklist::new()),
        );
        let issued = other.issue("user-1", "ada@example.com").unwrap();

        assert!(jwt.authenticate(&issued.token).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_yields_distinct_token_and_revokes_old() {
        let jwt = service();
        let issued = jwt.issue("user-1", "ada@example.com").unwrap();

        let refreshed = jwt.refresh(&issued.token).await.unwrap();
        assert_ne!(refreshed.token, issued.token);
        assert_ne!(refreshed.claims.jti, issued.claims.jti);
        assert_eq!(refreshed.claims.orig_iat, issued.claims.orig_iat);
        assert_eq!(refreshed.claims.sub, "user-1");

        assert!(matches!(
            jwt.authenticate(&issued.token).await,
            Err(JwtError::Revoked)
        ));
        assert!(matches!(
            jwt.refresh(&issued.token).await,
            Err(JwtError::Revoked)
        ));
        assert!(jwt.authenticate(&refreshed.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_accepts_expired_token_inside_window() {
        let jwt = service();
        let past = now_secs() - 2 * 60 * 60;
        let issued = jwt.issue_at("user-1", "ada@example.com", past, past).unwrap();

        let refreshed = jwt.refresh(&issued.token).await.unwrap();
        assert_eq!(refreshed.claims.orig_iat, past);
        assert!(jwt.authenticate(&refreshed.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rejected_after_window() {
        let jwt = service();
        let past = now_secs() - 15 * 24 * 60 * 60;
        let issued = jwt.issue_at("user-1", "ada@example.com", past, past).unwrap();

        assert!(matches!(
            jwt.refresh(&issued.token).await,
            Err(JwtError::RefreshExpired)
        ));
    }

    #[tokio::test]
    async fn test_invalidate_blocks_token() {
        let jwt = service();
        let issued = jwt.issue("user-1", "ada@example.com").unwrap();

        jwt.invalidate(&issued.claims).await.unwrap();
        assert!(matches!(
            jwt.authenticate(&issued.token).await,
            Err(JwtError::Revoked)
        ));
        assert!(jwt.refresh(&issued.token).await.is_err());
    }

    #[tokio::test]
    async fn test_revocation_outlives_late_refresh() {
        let jwt = service();
        let blacklist = jwt.blacklist().clone();
        // Chain whose refresh window closes in 60 seconds
        let orig_iat = now_secs() - JwtConfig::default().refresh_ttl_secs + 60;
        let issued = jwt
            .issue_at("user-1", "ada@example.com", orig_iat, orig_iat)
            .unwrap();

        let refreshed = jwt.refresh(&issued.token).await.unwrap();
        assert!(refreshed.claims.exp > jwt.refresh_deadline(&refreshed.claims));
        jwt.invalidate(&refreshed.claims).await.unwrap();

        // Past the refresh window, but the refreshed token's exp is still ahead
        blacklist.purge_expired(now_secs() + 120).await.unwrap();

        assert!(matches!(
            jwt.authenticate(&refreshed.token).await,
            Err(JwtError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_purge_keeps_live_revocations() {
        let jwt = service();
        let blacklist = jwt.blacklist().clone();
        let issued = jwt.issue("user-1", "ada@example.com").unwrap();
        jwt.invalidate(&issued.claims).await.unwrap();

        let purged = blacklist.purge_expired(now_secs()).await.unwrap();
        assert_eq!(purged, 0);
        assert!(jwt.authenticate(&issued.token).await.is_err());

        // Once the token is dead on both counts the record may go
        let purged = blacklist
            .purge_expired(jwt.revoked_until(&issued.claims) + 1)
            .await
            .unwrap();
        assert_eq!(purged, 1);
    }

    #[test]
    fn test_revoked_until_covers_exp_and_window() {
        let jwt = JwtService::new(
            JwtConfig {
                leeway_secs: 30,
                ..JwtConfig::default()
            },
            Arc::new(MemoryTokenBlacklist::new()),
        );
        let now = now_secs();

        let fresh = jwt.issue_at("user-1", "a@b.io", now, now).unwrap().claims;
        assert_eq!(jwt.revoked_until(&fresh), jwt.refresh_deadline(&fresh));

        let late = jwt
            .issue_at("user-1", "a@b.io", now, now - JwtConfig::default().refresh_ttl_secs)
            .unwrap()
            .claims;
        assert_eq!(jwt.revoked_until(&late), late.exp + 30);
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(JwtService::extract_from_header("Bearer abc"), Some("abc"));
        assert_eq!(JwtService::extract_from_header("bearer abc"), Some("abc"));
        assert_eq!(JwtService::extract_from_header("BEARER   abc "), Some("abc"));
        assert_eq!(JwtService::extract_from_header("Bearer "), None);
        assert_eq!(JwtService::extract_from_header("Bearer"), None);
        assert_eq!(JwtService::extract_from_header("Basic abc"), None);
        assert_eq!(JwtService::extract_from_header("Bearerabc"), None);
    }

    #[test]
    fn test_error_mapping() {
        use shared::ErrorCode;
        assert_eq!(
            AppError::from(JwtError::ExpiredToken).code,
            ErrorCode::TokenExpired
        );
        assert_eq!(
            AppError::from(JwtError::RefreshExpired).code,
            ErrorCode::SessionExpired
        );
        assert_eq!(AppError::from(JwtError::Revoked).code, ErrorCode::TokenInvalid);
    }
}
