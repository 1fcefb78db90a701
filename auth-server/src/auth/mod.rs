//! Token authority, request authentication and rate limiting

pub mod blacklist;
pub mod extractor;
pub mod jwt;
pub mod rate_limit;

pub use blacklist::{MemoryTokenBlacklist, TokenBlacklist};
pub use extractor::{AuthSession, BearerToken};
pub use jwt::{Claims, JwtConfig, JwtError, JwtService};
