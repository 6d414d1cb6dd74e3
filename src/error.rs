//! Error types for the protube-dl library.

use thiserror::Error;

/// Errors that can occur while submitting links and tracking downloads.
#[derive(Error, Debug)]
pub enum Error {
    /// The user supplied unusable input; no network call was attempted.
    #[error("{0}")]
    UserInput(String),

    /// The service answered with a non-success status.
    #[error("{message}")]
    Server {
        /// HTTP status code of the response.
        status: u16,
        /// Message reported by the service, or a status-derived fallback.
        message: String,
    },

    /// No response was received (DNS, connection or timeout failure).
    #[error("Network error: {0}")]
    Network(String),

    /// Push-driven progress was requested but the live channel is not connected.
    #[error("Live progress channel is not connected yet")]
    ChannelNotReady,

    /// A session was registered under an empty key.
    #[error("Session key must not be empty")]
    EmptySessionKey,

    /// The operation was cancelled before it finished.
    #[error("Cancelled")]
    Cancelled,

    /// I/O error while saving a payload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Text shown to the user, worded by the remediation that applies.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => {
                "Network error or server unreachable. Check your connection.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Returns true for transport-level failures.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// A specialized `Result` type for protube-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
