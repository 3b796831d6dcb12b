//! Connection configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use websocket_manager_client::{ConnectionOptions, ProtocolErrorPolicy};
//!
//! let options = ConnectionOptions::new()
//!     .with_handshake_timeout(Duration::from_secs(5))
//!     .with_max_message_size(64 * 1024)
//!     .with_protocol_error_policy(ProtocolErrorPolicy::Terminate);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

// ============================================================================
// Constants
// ============================================================================

/// Default deadline for the WebSocket handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ProtocolErrorPolicy
// ============================================================================

/// What the receive loop does after a malformed frame or payload.
///
/// Unknown method names are never subject to this policy; they are always
/// reported and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProtocolErrorPolicy {
    /// Report the error and keep the connection open.
    #[default]
    Report,
    /// Report the error, then close the connection gracefully.
    Terminate,
}

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Connection configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Deadline for the handshake. `None` waits indefinitely.
    pub handshake_timeout: Option<Duration>,

    /// Largest inbound message accepted by the transport.
    /// `None` keeps the transport default.
    pub max_message_size: Option<usize>,

    /// Handling of malformed frames after the connection is open.
    pub protocol_error_policy: ProtocolErrorPolicy,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
            max_message_size: None,
            protocol_error_policy: ProtocolErrorPolicy::Report,
        }
    }

    /// Sets the handshake deadline.
    #[inline]
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Removes the handshake deadline.
    #[inline]
    #[must_use]
    pub const fn without_handshake_timeout(mut self) -> Self {
        self.handshake_timeout = None;
        self
    }

    /// Limits the size of inbound messages.
    #[inline]
    #[must_use]
    pub const fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = Some(bytes);
        self
    }

    /// Sets the protocol error policy.
    #[inline]
    #[must_use]
    pub const fn with_protocol_error_policy(mut self, policy: ProtocolErrorPolicy) -> Self {
        self.protocol_error_policy = policy;
        self
    }

    /// Builds the transport configuration, if any option affects it.
    pub(crate) fn websocket_config(&self) -> Option<WebSocketConfig> {
        self.max_message_size.map(|bytes| {
            WebSocketConfig::default()
                .max_message_size(Some(bytes))
                .max_frame_size(Some(bytes))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
