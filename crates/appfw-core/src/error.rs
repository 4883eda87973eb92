//! Error types for the application framework client.
//!
//! Errors fall into three groups:
//! - synchronous input errors (`InvalidArgument`), raised before anything
//!   reaches the transport;
//! - internal invariant violations (`UnknownCorrelation`), which indicate a
//!   framework or transport bug and must not be absorbed;
//! - transport/connection errors for requests that could not be handed off.
//!
//! Failures reported by the framework itself after a request was issued are
//! never raised here. They arrive as status values in callbacks
//! (see [`AsyncFailure`]).

use std::net::SocketAddr;
use thiserror::Error;

use crate::registry::{CallbackKind, CorrelationId};

/// Main error type for the application framework client.
#[derive(Debug, Error)]
pub enum AppFwError {
    // Input errors
    #[error("Invalid argument for {field}: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("Failed to convert user name {name} to a user id")]
    UnknownUser { name: String },

    // Internal invariant violations
    #[error(
        "Internal app framework error: no pending {kind} callback for id {id}. This is a bug."
    )]
    UnknownCorrelation {
        kind: CallbackKind,
        id: CorrelationId,
    },

    // Lifecycle errors
    #[error("Application framework context has been released")]
    ContextReleased,

    #[error("Event loop is already running")]
    LoopAlreadyRunning,

    #[error("Transport closed the notification channel of an unreleased context")]
    ChannelClosed,

    // Transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Connection to application framework at {addr} lost")]
    ConnectionLost { addr: SocketAddr },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for application framework operations.
pub type Result<T> = std::result::Result<T, AppFwError>;

impl From<std::io::Error> for AppFwError {
    fn from(err: std::io::Error) -> Self {
        AppFwError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for AppFwError {
    fn from(err: serde_json::Error) -> Self {
        AppFwError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl AppFwError {
    /// Create an `InvalidArgument` error.
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppFwError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a `Transport` error.
    pub fn transport(message: impl Into<String>) -> Self {
        AppFwError::Transport {
            message: message.into(),
        }
    }

    /// Whether this error signals a broken framework/transport contract.
    ///
    /// Fatal errors stop the event loop and are returned from it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppFwError::UnknownCorrelation { .. })
    }

    /// Whether this error was caused by the caller's input.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            AppFwError::InvalidArgument { .. } | AppFwError::UnknownUser { .. }
        )
    }
}

/// Non-zero status reported by the framework for a completed request.
///
/// This is a value handed to callbacks, never raised on the calling thread.
/// Callers decide whether it is recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Request failed with status {status}: {message}")]
pub struct AsyncFailure {
    pub status: i32,
    pub message: String,
}
