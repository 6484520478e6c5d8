//! Common error types for stumpcast

use thiserror::Error;

/// Common result type for stumpcast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across stumpcast components
///
/// The HTTP edge is the only place these are mapped to status codes;
/// everywhere else they travel as typed values with the upstream message
/// preserved.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code for this error kind.
    ///
    /// These strings are part of the HTTP error envelope contract and must
    /// not change between releases.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "STORE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::RateLimited(_) => "RATE_LIMITED",
            Error::Upstream(_) => "UPSTREAM_FAILURE",
            Error::Timeout(_) => "TIMEOUT",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(Error::InvalidInput("x".into()).code(), "INVALID_INPUT");
        assert_eq!(Error::RateLimited("x".into()).code(), "RATE_LIMITED");
        assert_eq!(Error::Timeout("x".into()).code(), "TIMEOUT");
    }
}
