//! Error types for tileset publishing.
//!
//! Remote status codes are not errors; they travel as [`ApiResponse`] values
//! and are judged by the publisher. Only transport and decoding problems end
//! up here.
//!
//! [`ApiResponse`]: crate::ApiResponse

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    /// The request never produced a response (connect, TLS, timeout, body read).
    #[error("HTTP transport error: {0}")]
    Http(String),

    /// A response arrived but could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Missing or inconsistent client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        PublishError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::InvalidResponse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;
