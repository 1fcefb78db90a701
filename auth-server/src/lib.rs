//! auth-server: account registration and bearer-token sessions
//!
//! - `POST /api/auth/register`: create an account
//! - `POST /api/auth/login`: exchange credentials for an access token
//! - `GET  /api/auth/me`: the account behind the token
//! - `POST /api/auth/refresh`: exchange a token for a new one in the same chain
//! - `POST /api/auth/logout`: revoke the token
//!
//! Handlers delegate to three collaborators held in [`state::AppState`]:
//! a [`db::UserStore`], the argon2 hasher in [`util`], and the
//! [`auth::JwtService`] token authority.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod state;
pub mod util;
pub mod validation;

pub use api::create_router;
pub use config::Config;
pub use state::AppState;
