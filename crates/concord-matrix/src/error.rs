//! Error types for concord-matrix.

use thiserror::Error;

/// Result type for concord-matrix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a room server.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP request itself failed (connect, TLS, timeout, decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a Matrix error body.
    #[error("server error {status} ({errcode}): {message}")]
    Api {
        status: u16,
        errcode: String,
        message: String,
    },

    /// A response was missing a field the protocol requires.
    #[error("response missing required field: {0}")]
    MissingField(&'static str),

    /// Reading a credentials file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A credentials file or response body was not valid JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error means "the thing does not exist" rather than a
    /// transient failure. The distinction matters: an absent alias is a
    /// normal state for reconciliation, a network hiccup is not.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { errcode, .. } if errcode == "M_NOT_FOUND")
    }
}
