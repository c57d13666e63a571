//! Remote call error types.

use thiserror::Error;

/// Result type alias for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors returned by the ledger and deferred-task clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("connecting to remote service: {0}")]
    Transport(String),

    #[error("remote call timed out: {0}")]
    Timeout(String),

    #[error("remote service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("decoding remote response: {0}")]
    Decode(String),

    #[error("remote service unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// The target no longer exists (or never did).
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            RemoteError::Timeout(error.to_string())
        } else if error.is_decode() {
            RemoteError::Decode(error.to_string())
        } else {
            RemoteError::Transport(error.to_string())
        }
    }
}
