//! Error types for the skiff client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the build server
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Server answered with a status other than the one the operation requires
    #[error("bad response when {action} (status {status}): {body}")]
    UnexpectedStatus {
        /// What the client was doing, e.g. "creating pipe"
        action: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body, for diagnosis
        body: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// A URL could not be built or rewritten
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A session cookie cannot be sent as a request header
    #[error("invalid session cookie: {0}")]
    InvalidCookie(String),

    /// WebSocket transport failed
    #[error("event stream failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Server refused to upgrade the event stream connection
    #[error("event stream rejected (status {status}): {body}")]
    HandshakeRejected {
        /// HTTP status code of the handshake response
        status: u16,
        /// Response body, for diagnosis
        body: String,
    },
}

impl ClientError {
    /// Create an unexpected status error from status code and body
    pub fn unexpected_status(action: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            action,
            status,
            body: body.into(),
        }
    }

    /// HTTP status the server answered with, if the error carries one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } | Self::HandshakeRejected { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
