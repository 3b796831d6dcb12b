//! Error types for the WebSocket manager client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use websocket_manager_client::{Connection, Result};
//!
//! async fn example(connection: &Connection) -> Result<()> {
//!     connection.connect("ws://localhost:5000/chat").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::InvalidUri`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::NotConnected`] |
//! | Lifecycle | [`Error::InvalidState`], [`Error::Cancelled`] |
//! | Protocol | [`Error::Protocol`], [`Error::UnknownMethod`], [`Error::HandlerPanicked`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Task`] |
//!
//! Connection errors are fatal to the attempt that produced them and are
//! returned to the caller of [`Connection::connect`](crate::Connection::connect).
//! Protocol errors happen inside the receive loop; they are reported through
//! [`Connection::on_error`](crate::Connection::on_error). Under the default
//! [`ProtocolErrorPolicy::Report`](crate::ProtocolErrorPolicy::Report) the loop
//! keeps running; under
//! [`ProtocolErrorPolicy::Terminate`](crate::ProtocolErrorPolicy::Terminate) a
//! malformed frame closes the connection gracefully. Dispatch failures
//! ([`Error::UnknownMethod`], [`Error::HandlerPanicked`]) never end the loop.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::task::JoinError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::transport::ConnectionState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// The server URI is malformed or does not use a WebSocket scheme.
    #[error("Invalid URI '{uri}': {message}")]
    InvalidUri {
        /// The rejected URI.
        uri: String,
        /// Why the URI was rejected.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket handshake or socket-level failure.
    ///
    /// Returned when the connection cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the transport failure.
        message: String,
    },

    /// Handshake did not complete within the configured deadline.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Operation requires an open connection.
    #[error("Not connected (state: {state})")]
    NotConnected {
        /// State the connection was in.
        state: ConnectionState,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Operation is not allowed in the current lifecycle state.
    #[error("Invalid state for {operation}: {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State the connection was in.
        state: ConnectionState,
    },

    /// The connection attempt was cancelled.
    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed frame or payload.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Invocation named a method with no registered handler.
    #[error("Unknown method: {method}")]
    UnknownMethod {
        /// The method name that was not found.
        method: String,
    },

    /// A registered handler panicked while running an invocation.
    #[error("Handler for {method} panicked: {message}")]
    HandlerPanicked {
        /// Method whose handler panicked.
        method: String,
        /// Panic payload, if it was a string.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Receive loop task failed to join.
    #[error("Receive loop task failed: {0}")]
    Task(#[from] JoinError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid URI error.
    #[inline]
    pub fn invalid_uri(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a not connected error.
    #[inline]
    pub fn not_connected(state: ConnectionState) -> Self {
        Self::NotConnected { state }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(operation: &'static str, state: ConnectionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an unknown method error.
    #[inline]
    pub fn unknown_method(method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            method: method.into(),
        }
    }

    /// Creates a handler panicked error.
    #[inline]
    pub fn handler_panicked(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerPanicked {
            method: method.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::NotConnected { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a protocol error.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. }
                | Self::UnknownMethod { .. }
                | Self::HandlerPanicked { .. }
                | Self::Json(_)
        )
    }

    /// Returns `true` if this error came from dispatching an invocation.
    ///
    /// Dispatch errors are confined to one invocation and never close the
    /// connection, whatever the protocol error policy.
    #[inline]
    #[must_use]
    pub fn is_dispatch_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownMethod { .. } | Self::HandlerPanicked { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors are confined to a single frame; the receive loop
    /// keeps running after them.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_protocol_error()
    }
}

// ============================================================================
// Tests
// ============================================================================
