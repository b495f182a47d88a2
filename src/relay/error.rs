//! Error types for the relay client

use serde::Deserialize;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Structured failure payload returned by the relay.
///
/// Only ever produced by decoding a response body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Error)]
#[error("{code}: {message} (ID: {id})")]
pub struct ProtocolError {
    /// Short machine-readable code, e.g. `expired`
    pub code: String,
    /// Human-readable description
    pub message: String,
    /// Correlation identifier for the relay's logs
    pub id: String,
}

/// Relay client error
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or invalid configuration at construction
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session token rejected or expired
    #[error("Authentication rejected (HTTP {status}){}", detail_suffix(.error))]
    Auth {
        status: u16,
        error: Option<ProtocolError>,
    },

    /// Non-2xx response to a session lifecycle call
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Upgrade answered with neither a switch nor an unauthorized status
    #[error("Relay responded with unexpected status {status}")]
    UnexpectedStatus { status: u16 },

    /// Network, DNS, TLS or timeout failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body did not decode as expected
    #[error("Decode error: {0}")]
    Decode(String),

    /// The connection handle was already torn down
    #[error("Connection already disconnected")]
    AlreadyDisconnected,
}

fn detail_suffix(error: &Option<ProtocolError>) -> String {
    match error {
        Some(e) => format!(": {}", e),
        None => String::new(),
    }
}

impl RelayError {
    /// The relay's structured error, if this is an authentication failure that carried one.
    pub fn protocol_error(&self) -> Option<&ProtocolError> {
        match self {
            Self::Auth { error, .. } => error.as_ref(),
            _ => None,
        }
    }

    /// Whether the caller has to establish a new session before retrying.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<tungstenite::Error> for RelayError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
