//! Server configuration

use crate::auth::jwt::JwtConfig;
use crate::auth::rate_limit::RateLimits;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Minimum JWT secret length outside development
const MIN_SECRET_LEN: usize = 32;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    /// HTTP port
    pub http_port: u16,
    /// PostgreSQL connection URL. `None` selects the in-memory stores.
    pub database_url: Option<String>,
    /// Token authority settings
    pub jwt: JwtConfig,
    /// Per-IP limits for the public credential routes
    pub rate_limits: RateLimits,
    /// Emit JSON log lines instead of the human-readable format
    pub log_json: bool,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if environment != "development" && val.len() < MIN_SECRET_LEN {
            return Err(format!(
                "{name} must be at least {MIN_SECRET_LEN} characters in {environment} environment"
            )
            .into());
        }
        Ok(val)
    }

    fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if database_url.is_none() && environment != "development" {
            return Err(format!("DATABASE_URL must be set in {environment} environment").into());
        }

        let ttl_minutes: i64 = Self::parse_or("JWT_TTL", 60);
        let refresh_ttl_minutes: i64 = Self::parse_or("JWT_REFRESH_TTL", 20_160);

        Ok(Self {
            http_port: Self::parse_or("HTTP_PORT", 8080),
            database_url,
            jwt: JwtConfig {
                secret: Self::require_secret("JWT_SECRET", &environment)?,
                ttl_secs: ttl_minutes * 60,
                refresh_ttl_secs: refresh_ttl_minutes * 60,
                issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "auth-server".into()),
                leeway_secs: Self::parse_or("JWT_LEEWAY", 0),
            },
            rate_limits: RateLimits {
                login_per_minute: Self::parse_or("LOGIN_RATE_LIMIT", 5),
                register_per_minute: Self::parse_or("REGISTER_RATE_LIMIT", 3),
                trust_proxy: Self::parse_or("TRUST_PROXY", false),
            },
            log_json: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
            environment,
        })
    }
}
