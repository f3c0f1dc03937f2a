//! Error types for the chat session layer.

use thiserror::Error;

/// Errors that can occur while running a conversation session.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The handshake did not yield a thread id.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// A send was attempted before a thread was established.
    #[error("No conversation thread; start the session first")]
    NotStarted,

    /// A send was attempted while another reply is still awaited.
    #[error("A reply is already in flight")]
    Busy,

    /// The outgoing text is empty after trimming.
    #[error("Message cannot be empty")]
    EmptyMessage,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpRequest(reqwest::Error),

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// The remote endpoint answered with a non-success status.
    #[error("Remote endpoint returned status {0}")]
    HttpStatus(u16),

    /// Timeout waiting for the remote endpoint.
    #[error("Request timed out")]
    Timeout,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure not covered by the HTTP variants.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Coarse classification of a [`ChatError`] at the session boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChatErrorKind {
    /// No thread id could be obtained.
    Handshake,
    /// A round-trip to the remote endpoint failed.
    Transmit,
    /// The call was rejected before anything was mutated.
    Precondition,
    /// The session could not be configured.
    Setup,
}

impl ChatError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ChatErrorKind {
        match self {
            Self::Handshake(_) => ChatErrorKind::Handshake,
            Self::NotStarted | Self::Busy | Self::EmptyMessage => ChatErrorKind::Precondition,
            Self::HttpRequest(_)
            | Self::HttpStatus(_)
            | Self::Timeout
            | Self::Json(_)
            | Self::Transport(_) => ChatErrorKind::Transmit,
            Self::HttpClient(_) | Self::InvalidUrl(_) | Self::Config(_) => ChatErrorKind::Setup,
        }
    }

    /// Check if the rejected call left the session untouched.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self.kind(), ChatErrorKind::Precondition)
    }

    /// Check if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::HttpRequest(_) | Self::Handshake(_) | Self::Busy => true,
            Self::HttpStatus(status) => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else {
            Self::HttpRequest(value)
        }
    }
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(ChatError::Busy.to_string(), "A reply is already in flight");
        assert_eq!(ChatError::EmptyMessage.to_string(), "Message cannot be empty");
        assert_eq!(
            ChatError::HttpStatus(502).to_string(),
            "Remote endpoint returned status 502"
        );
        assert_eq!(
            ChatError::Handshake("no thread id".to_string()).to_string(),
            "Handshake failed: no thread id"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ChatError::NotStarted.kind(), ChatErrorKind::Precondition);
        assert_eq!(ChatError::Busy.kind(), ChatErrorKind::Precondition);
        assert_eq!(ChatError::Timeout.kind(), ChatErrorKind::Transmit);
        assert_eq!(ChatError::HttpStatus(500).kind(), ChatErrorKind::Transmit);
        assert_eq!(
            ChatError::Handshake(String::new()).kind(),
            ChatErrorKind::Handshake
        );
        assert!(ChatError::EmptyMessage.is_precondition());
        assert!(!ChatError::Timeout.is_precondition());
    }

    #[test]
    fn test_retryable() {
        assert!(ChatError::Timeout.is_retryable());
        assert!(ChatError::HttpStatus(503).is_retryable());
        assert!(!ChatError::HttpStatus(404).is_retryable());
        assert!(!ChatError::NotStarted.is_retryable());
    }
}
