//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            // 422 Unprocessable Entity (field-level validation)
            Self::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,

            // 401 Unauthorized
            Self::NotAuthenticated
            | Self::InvalidCredentials
            | Self::TokenExpired
            | Self::TokenInvalid
            | Self::SessionExpired => StatusCode::UNAUTHORIZED,

            // 429 Too Many Requests
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            Self::Unknown | Self::InternalError | Self::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            Self::InvalidRequest => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_status() {
        assert_eq!(ErrorCode::Success.http_status(), StatusCode::OK);
    }

    #[test]
    fn test_validation_status() {
        assert_eq!(
            ErrorCode::ValidationFailed.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_unauthorized_status() {
        for code in [
            ErrorCode::NotAuthenticated,
            ErrorCode::InvalidCredentials,
            ErrorCode::TokenExpired,
            ErrorCode::TokenInvalid,
            ErrorCode::SessionExpired,
        ] {
            assert_eq!(code.http_status(), StatusCode::UNAUTHORIZED, "{code:?}");
        }
    }

    #[test]
    fn test_rate_limited_status() {
        assert_eq!(
            ErrorCode::RateLimited.http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_internal_error_status() {
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::DatabaseError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bad_request_status() {
        assert_eq!(
            ErrorCode::InvalidRequest.http_status(),
            StatusCode::BAD_REQUEST
        );
    }
}
