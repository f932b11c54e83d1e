//! Error types for sub2api-upstream

use thiserror::Error;

/// Upstream client error
#[derive(Debug, Error)]
pub enum Error {
    /// Connection, TLS or timeout failure
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("api error (HTTP {status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Body could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Client could not be constructed (bad proxy URL, TLS setup)
    #[error("client build error: {0}")]
    Build(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Error::Build(e.to_string())
        } else if e.is_decode() {
            Error::InvalidResponse(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}

impl From<Error> for sub2api_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Network(msg) => sub2api_core::Error::Network(msg),
            Error::Build(msg) => sub2api_core::Error::Network(format!("client build: {msg}")),
            other => sub2api_core::Error::Upstream(other.to_string()),
        }
    }
}
