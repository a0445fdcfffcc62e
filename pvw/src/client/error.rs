//! Purview client error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the Purview Data Map API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP 429: rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Check if this is a rate limit error
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }

    /// Check if this error is worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } => true,
            ApiError::Status { status, .. } => is_retryable_status(*status),
            ApiError::Network(_) => true,
            ApiError::Timeout(_) => true,
            ApiError::InvalidResponse(_) => false,
            ApiError::InvalidRequest(_) => false,
            ApiError::Json(_) => false,
        }
    }

    /// Server-supplied delay before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status associated with this error, when there was a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_rate_limit() {
        let err = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert!(err.is_rate_limit());

        let err = ApiError::Status {
            status: 500,
            message: "Server error".to_string(),
        };
        assert!(!err.is_rate_limit());
    }

    #[test]
    fn test_is_retryable() {
        assert!(ApiError::RateLimited { retry_after: None }.is_retryable());

        assert!(
            ApiError::Status {
                status: 503,
                message: "Unavailable".to_string()
            }
            .is_retryable()
        );

        // 4xx other than 408/429 are final
        assert!(
            !ApiError::Status {
                status: 400,
                message: "Bad request".to_string()
            }
            .is_retryable()
        );
        assert!(
            !ApiError::Status {
                status: 401,
                message: "Unauthorized".to_string()
            }
            .is_retryable()
        );

        assert!(ApiError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!ApiError::InvalidResponse("no guid".to_string()).is_retryable());
        assert!(!ApiError::InvalidRequest("invalid path segment '..'".to_string()).is_retryable());
    }

    #[test]
    fn test_status_and_retry_after() {
        let err = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(42)),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));

        let err = ApiError::Status {
            status: 404,
            message: "missing".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.retry_after(), None);

        assert_eq!(ApiError::Timeout(Duration::from_secs(1)).status(), None);
    }

    #[test]
    fn test_status_message_includes_code() {
        let err = ApiError::Status {
            status: 502,
            message: "Bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502: Bad gateway");
    }
}
