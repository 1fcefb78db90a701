//! Auth API DTOs shared between the server and its clients

use serde::{Deserialize, Serialize};

/// Token type reported alongside every access token
pub const TOKEN_TYPE_BEARER: &str = "bearer";

// =============================================================================
// Requests
// =============================================================================

/// Registration request
///
/// Every field is optional at the wire level so that a missing field is
/// reported as a validation violation rather than a deserialization failure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_confirmation: Option<String>,
}

/// Login request
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// =============================================================================
// Responses
// =============================================================================

/// Public user fields. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Unix millis
    pub created_at: i64,
    /// Unix millis
    pub updated_at: i64,
}

/// Token bundle returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserInfo,
    /// Seconds until `access_token` expires
    pub expires_in: i64,
}

/// `{"status": "success", "message": ..., "result": ...}` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse<T> {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> StatusResponse<T> {
    pub fn success(message: impl Into<String>, result: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            result: Some(result),
        }
    }
}

impl StatusResponse<()> {
    /// Acknowledgement without payload
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            result: None,
        }
    }
}
