//! Transport error types

use thiserror::Error;

/// Shown when a request went out but nothing came back
pub const UNREACHABLE_MESSAGE: &str =
    "Could not connect to the server. Check that the URL is correct and that the service is running.";

/// Fallback when a failure carries no message of its own
pub const UNKNOWN_MESSAGE: &str = "Unknown error while sending the message";

/// Transport failure with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Non-success status. The server's own message wins when it has one.
    pub fn server(status: u16, server_message: Option<&str>) -> Self {
        let message = match server_message {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => format!("Server error: {status}"),
        };
        Self::new(TransportErrorKind::Server { status }, message)
    }

    pub fn unreachable() -> Self {
        Self::new(TransportErrorKind::Unreachable, UNREACHABLE_MESSAGE)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.is_empty() {
            Self::new(TransportErrorKind::Unknown, UNKNOWN_MESSAGE)
        } else {
            Self::new(TransportErrorKind::Unknown, message)
        }
    }
}

/// Which of the three failure branches fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The remote answered with a non-success status
    Server { status: u16 },
    /// Network, DNS or timeout: no response arrived
    Unreachable,
    /// Anything else
    Unknown,
}

impl TransportErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Server { .. } => "server",
            Self::Unreachable => "unreachable",
            Self::Unknown => "unknown",
        }
    }
}
