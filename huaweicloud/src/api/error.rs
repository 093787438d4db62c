use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): [{code}] {message}")]
    ApiError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::ApiError { code, .. } => Some(code),
            _ => None,
        }
    }

    /// A synthetic 404 for lookups that come back empty instead of failing
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::ApiError {
            status: 404,
            code: String::new(),
            message: message.into(),
        }
    }

    /// True when the remote object no longer exists
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Some services answer 400 with a service error code for missing
    /// objects; rewrite those into a 404 so `is_not_found` sees them.
    pub fn with_not_found_code(self, error_code: &str) -> Self {
        match self {
            ApiError::ApiError {
                status: 400,
                code,
                message,
            } if code == error_code => ApiError::ApiError {
                status: 404,
                code,
                message,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, code: &str) -> ApiError {
        ApiError::ApiError {
            status,
            code: code.to_string(),
            message: "msg".to_string(),
        }
    }

    #[test]
    fn plain_404_is_not_found() {
        assert!(api_error(404, "APIG.3001").is_not_found());
        assert!(!api_error(400, "APIG.2012").is_not_found());
        assert!(!ApiError::RateLimited.is_not_found());
        assert!(ApiError::not_found("no throttle named p1").is_not_found());
    }

    #[test]
    fn expected_400_code_becomes_not_found() {
        let err = api_error(400, "AOM.02018001").with_not_found_code("AOM.02018001");
        assert!(err.is_not_found());

        let other = api_error(400, "AOM.0400").with_not_found_code("AOM.02018001");
        assert!(!other.is_not_found());
        assert_eq!(other.code(), Some("AOM.0400"));
    }
}
