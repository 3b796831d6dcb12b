//! WebSocket Manager Client - server-to-client method invocation over WebSocket.
//!
//! This library connects to a WebSocket manager server, keeps a single
//! persistent connection open, and calls locally registered handlers when
//! the server invokes them by name.
//!
//! # Architecture
//!
//! The client follows a push model:
//!
//! - **Server**: Assigns a connection id, then pushes method invocations
//! - **Client (Rust)**: Runs a receive loop and dispatches each invocation
//!
//! Key design principles:
//!
//! - Each [`Connection`] owns one WebSocket + one receive loop task
//! - Messages are JSON envelopes tagged with a [`MessageType`]
//! - Handlers are looked up by method name; a miss is reported, never fatal
//! - Frames are processed strictly in arrival order
//!
//! # Quick Start
//!
//! ```no_run
//! use websocket_manager_client::{Connection, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connection = Connection::new();
//!
//!     connection.on("Broadcast", |args| {
//!         println!("Broadcast: {args:?}");
//!     });
//!
//!     connection.on_error(|error| {
//!         eprintln!("Receive loop error: {error}");
//!     });
//!
//!     let receive_loop = connection.start("ws://localhost:5000/chat").await?;
//!     println!("Connected as {:?}", connection.connection_id());
//!
//!     connection.stop()?;
//!     receive_loop.wait().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dispatch`] | Handler registry and invocation routing |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | Connection, receive loop, configuration |

// ============================================================================
// Modules
// ============================================================================

/// Handler registry and invocation routing.
pub mod dispatch;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire message types.
///
/// Envelope and invocation descriptor structures.
pub mod protocol;

/// WebSocket transport layer.
///
/// Connection lifecycle and the receive loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Dispatch types
pub use dispatch::{Handler, HandlerRegistry, InvocationHandler};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Protocol types
pub use protocol::{InvocationDescriptor, Message, MessageType};

// Transport types
pub use transport::{
    Connection, ConnectionOptions, ConnectionState, ErrorHandler, ProtocolErrorPolicy, ReceiveLoop,
};
