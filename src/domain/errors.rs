use thiserror::Error;

/// Failures of the backing store.
///
/// These are the only errors that abort a whole request; missing rows are
/// reported as `None` or empty collections instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed value in column {column}: {value}")]
    Decode { column: String, value: String },
}

/// Malformed request parameters, rejected before reaching the core
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("limit must be between 1 and {max}, got {value}")]
    LimitOutOfRange { value: i64, max: u32 },

    #[error("hours must be between 1 and {max}, got {value}")]
    HoursOutOfRange { value: i64, max: u32 },

    #[error("Unknown action: {0} (expected BUY, SELL or CANCEL)")]
    UnknownAction(String),

    #[error("Symbol must not be empty")]
    EmptySymbol,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// HTTP-facing error, rendered as `{"error": "..."}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Unavailable(reason) => ApiError::ServiceUnavailable(reason),
            decode @ RepositoryError::Decode { .. } => {
                ApiError::InternalServerError(decode.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_maps_to_service_unavailable() {
        let api: ApiError = RepositoryError::Unavailable("pool timed out".to_string()).into();
        assert!(matches!(api, ApiError::ServiceUnavailable(ref r) if r == "pool timed out"));
    }

    #[test]
    fn test_decode_maps_to_internal_error() {
        let api: ApiError = RepositoryError::Decode {
            column: "price".to_string(),
            value: "n/a".to_string(),
        }
        .into();
        match api {
            ApiError::InternalServerError(message) => {
                assert_eq!(message, "Malformed value in column price: n/a")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validation_messages() {
        let error = ValidationError::LimitOutOfRange { value: 0, max: 500 };
        assert_eq!(error.to_string(), "limit must be between 1 and 500, got 0");
        assert_eq!(
            ApiError::from(ValidationError::EmptySymbol).to_string(),
            "Invalid request: Symbol must not be empty"
        );
    }
}
