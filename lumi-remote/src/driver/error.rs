//! Driver error types
//!
//! Every remote failure is a [`DriverError`]. Callers above the driver mostly
//! care about which of the three [`ErrorKind`]s it falls into: a missing
//! element, a recoverable transport fault, or a dead session.

use serde_json::Value;
use thiserror::Error;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Command not supported by the server: {0}")]
    Unsupported(String),

    #[error("Session is no longer usable: {0}")]
    SessionFatal(String),

    #[error("Server returned '{error}': {message}")]
    Protocol { error: String, message: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Failed to decode server response: {0}")]
    Decode(String),
}

/// Coarse error taxonomy used for recovery decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Transport,
    SessionFatal,
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::NoSuchElement(_) => ErrorKind::NotFound,
            DriverError::SessionFatal(_) => ErrorKind::SessionFatal,
            DriverError::Unsupported(_)
            | DriverError::Protocol { .. }
            | DriverError::Transport(_)
            | DriverError::Decode(_) => ErrorKind::Transport,
        }
    }

    pub fn is_session_fatal(&self) -> bool {
        self.kind() == ErrorKind::SessionFatal
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, DriverError::Unsupported(_))
    }

    /// Map a reqwest failure; a refused connection is session-fatal
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() {
            DriverError::SessionFatal(format!("automation server unreachable: {}", err))
        } else {
            DriverError::Transport(err)
        }
    }

    /// Classify a W3C error from its `error` code and `message`
    pub fn from_w3c(error: &str, message: &str) -> Self {
        let message = message.to_string();
        match error {
            "no such element" | "stale element reference" => DriverError::NoSuchElement(message),
            "invalid session id" | "session not created" => DriverError::SessionFatal(message),
            "unknown command" | "unknown method" | "unsupported operation" => {
                DriverError::Unsupported(message)
            }
            other => DriverError::Protocol {
                error: other.to_string(),
                message,
            },
        }
    }

    /// Classify an error response by HTTP status and JSON body
    pub fn from_response(status: u16, body: &Value) -> Self {
        let value = body.get("value").unwrap_or(body);
        let error = value.get("error").and_then(Value::as_str);
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match error {
            Some(code) => Self::from_w3c(code, message),
            None => match status {
                404 | 405 | 501 => DriverError::Unsupported(format!("HTTP {}", status)),
                _ => DriverError::Protocol {
                    error: format!("HTTP {}", status),
                    message: message.to_string(),
                },
            },
        }
    }
}
