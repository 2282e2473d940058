//! Shared error type across subminer crates.

use thiserror::Error;

/// Stable error codes surfaced to callers (and logged by the context pump).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A correlated request received no response before its deadline.
    Timeout,
    /// Required settings/state were missing before an operation started.
    Precondition,
    /// The underlying post primitive failed (target context gone).
    Transport,
    /// A message carried a command this component does not handle.
    UnknownCommand,
    /// Malformed JSON or a message with the wrong shape.
    BadMessage,
    /// Invalid configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and error payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Precondition => "PRECONDITION",
            ErrorKind::Transport => "TRANSPORT",
            ErrorKind::UnknownCommand => "UNKNOWN_COMMAND",
            ErrorKind::BadMessage => "BAD_MESSAGE",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type used by core and bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("request timed out: command={command} message_id={message_id}")]
    Timeout { command: String, message_id: String },
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("bad message: {0}")]
    BadMessage(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Map the error to its stable code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Timeout { .. } => ErrorKind::Timeout,
            BridgeError::Precondition(_) => ErrorKind::Precondition,
            BridgeError::Transport(_) => ErrorKind::Transport,
            BridgeError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            BridgeError::BadMessage(_) => ErrorKind::BadMessage,
            BridgeError::Config(_) => ErrorKind::Config,
            BridgeError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BridgeError::Timeout { .. })
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::BadMessage(e.to_string())
    }
}
