//! Error types for the events site.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving the events site.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Notion returned an error object or a non-2xx status
    #[error("Notion error ({status} {code}): {message}")]
    Notion {
        status: u16,
        code: String,
        message: String,
    },

    /// Stripe returned an error object or a non-2xx status
    #[error("Stripe error ({status}): {message}")]
    Stripe { status: u16, message: String },

    /// Transport-level HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// True when Notion rejected a write because the properties did not
    /// match the database schema.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Error::Notion { code, .. } if code == "validation_error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Validation("name".into()).status_code(), 400);
        assert_eq!(Error::NotFound("event".into()).status_code(), 404);
        assert_eq!(Error::Internal("boom".into()).status_code(), 500);
        assert_eq!(
            Error::Stripe {
                status: 402,
                message: "card".into()
            }
            .status_code(),
            500
        );
    }

    #[test]
    fn test_schema_mismatch_only_for_validation_errors() {
        let schema = Error::Notion {
            status: 400,
            code: "validation_error".into(),
            message: "Email is not a property that exists.".into(),
        };
        let limited = Error::Notion {
            status: 429,
            code: "rate_limited".into(),
            message: "slow down".into(),
        };
        assert!(schema.is_schema_mismatch());
        assert!(!limited.is_schema_mismatch());
        assert!(!Error::Validation("email".into()).is_schema_mismatch());
    }
}
