//! Unified error system for the account service
//!
//! This module provides:
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ErrorResponse`]: JSON body returned for every failed request
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ErrorResponse};
//!
//! let err = AppError::new(ErrorCode::NotAuthenticated);
//!
//! let err = AppError::validation("The given data was invalid.")
//!     .with_detail("errors", serde_json::json!({"email": ["The email field is required."]}));
//!
//! let body = ErrorResponse::error(&err);
//! assert_eq!(body.code, 2);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{AppError, AppResult, ErrorResponse};
