//! Shared types for the account service
//!
//! Error system, auth DTOs and time helpers used by the server and by
//! anything that talks to it.

pub mod client;
pub mod error;
pub mod util;

// Re-exports
pub use error::{AppError, AppResult, ErrorCode};
