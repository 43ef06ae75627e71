//! Catalog error type.

use thiserror::Error;

/// `Result` alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Why a catalog lookup failed.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The request could not be sent or the response not read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request timed out.
    #[error("Timeout")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("Server error (status {status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Response body, if readable.
        message: String,
    },

    /// The response body is not the expected JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The catalog has no row for the object.
    #[error("TIC {tic_id} not found")]
    NotFound {
        /// Requested identifier.
        tic_id: u64,
    },
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout
        } else if err.is_connect() {
            CatalogError::Connection(err.to_string())
        } else if err.is_decode() {
            CatalogError::Parse(err.to_string())
        } else {
            CatalogError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Parse(err.to_string())
    }
}
