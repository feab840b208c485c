// Error handling module
// Defines the error taxonomy shared by the token lifecycle

use thiserror::Error;

use crate::ui::UiElement;

/// Errors that can occur while checking, obtaining or applying a token
#[derive(Error, Debug)]
pub enum AuthError {
    /// Remote endpoint unreachable, undecodable, or answered with a non-2xx status
    #[error("Network or server error: {}", describe_status(.status, .message))]
    NetworkOrServer {
        status: Option<u16>,
        message: String,
    },

    /// Wrong segment count or undecodable payload
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Expected documentation UI element was not found
    #[error("UI element missing: {0}")]
    UiElementMissing(UiElement),

    /// Nothing stored, or a login response without a token
    #[error("No token available")]
    NoTokenAvailable,

    /// Token store could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),
}

fn describe_status(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("{} - {}", code, message),
        None => message.to_string(),
    }
}

impl AuthError {
    /// Build a transport-level error (no HTTP status)
    pub fn network(message: impl Into<String>) -> Self {
        AuthError::NetworkOrServer {
            status: None,
            message: message.into(),
        }
    }

    /// Build a server error from a non-2xx status
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        AuthError::NetworkOrServer {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            "timeout"
        } else if e.is_connect() {
            "connection_failed"
        } else if e.is_decode() {
            "decode_error"
        } else if e.is_body() {
            "body_error"
        } else {
            "request_error"
        };
        AuthError::NetworkOrServer {
            status: e.status().map(|s| s.as_u16()),
            message: format!("{} (kind: {})", e, kind),
        }
    }
}

/// Result type alias for token lifecycle operations
pub type Result<T> = std::result::Result<T, AuthError>;
