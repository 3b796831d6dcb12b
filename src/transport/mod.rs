//! WebSocket transport layer.
//!
//! This module owns the socket: handshake, the receive loop, and closing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                          ┌─────────────────┐
//! │  Connection (Rust)   │        WebSocket         │  Server         │
//! │                      │◄─────────────────────────│                 │
//! │  receive loop task   │   ConnectionEvent        │  WebSocket      │
//! │  → HandlerRegistry   │   ClientMethodInvocation │  Manager        │
//! └──────────────────────┘                          └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::start` - Handshake, then spawn the receive loop
//! 2. Server sends `ConnectionEvent` - connection id stored
//! 3. Server sends `ClientMethodInvocation` - handler called inline
//! 4. `Connection::stop` or remote close - close handshake, loop exits
//! 5. `Connection::cancel` - loop exits without a close handshake
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Public connection API and lifecycle state |
//! | `options` | Connection configuration |
//! | `receiver` | Receive loop and its handle |

// ============================================================================
// Submodules
// ============================================================================

/// Client connection and lifecycle.
pub mod connection;

/// Connection configuration.
pub mod options;

/// Receive loop.
pub mod receiver;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionState, ErrorHandler};
pub use options::{ConnectionOptions, DEFAULT_HANDSHAKE_TIMEOUT, ProtocolErrorPolicy};
pub use receiver::ReceiveLoop;
