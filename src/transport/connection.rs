//! Client connection and lifecycle.
//!
//! A [`Connection`] owns one WebSocket, the handler registry and the
//! server-assigned connection id.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start──► Connecting ──handshake ok──► Open ──stop/close──► Closing ──► Closed
//!                     │                          │
//!                     └──handshake failed──► Idle└──cancel / stream end──► Closed
//! ```
//!
//! A connection is used once. After `Closed`, create a new one.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async_with_config;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::dispatch::{HandlerRegistry, InvocationHandler};
use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::options::ConnectionOptions;
use super::receiver::{self, ConnectionCommand, LoopContext, ReceiveLoop, WsStream};

// ============================================================================
// Types
// ============================================================================

/// Error handler callback type.
///
/// Called for every failure inside the receive loop that does not end it:
/// malformed frames and invocations of unregistered methods.
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Constructed, no transport activity yet.
    Idle,
    /// Handshake in flight.
    Connecting,
    /// Handshake succeeded, receive loop running.
    Open,
    /// Close frame sent, waiting for the loop to finish.
    Closing,
    /// Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Open => "Open",
            Self::Closing => "Closing",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Client connection to a WebSocket manager server.
///
/// Clones share the same socket, registry and state.
///
/// # Example
///
/// ```no_run
/// use websocket_manager_client::{Connection, Result};
///
/// # async fn example() -> Result<()> {
/// let connection = Connection::new();
///
/// connection.on("Broadcast", |args| {
///     println!("broadcast: {args:?}");
/// });
///
/// // Runs until the server closes the connection
/// connection.connect("ws://localhost:5000/chat").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connection {
    /// Configuration.
    options: ConnectionOptions,
    /// Lifecycle state (shared with the receive loop).
    state: Arc<Mutex<ConnectionState>>,
    /// Server-assigned id (written by the receive loop).
    connection_id: Arc<RwLock<Option<ConnectionId>>>,
    /// Invocation handlers.
    registry: HandlerRegistry,
    /// In-loop error callback.
    error_handler: Arc<Mutex<Option<ErrorHandler>>>,
    /// Channel to the receive loop, set once open.
    command_tx: Arc<Mutex<Option<mpsc::UnboundedSender<ConnectionCommand>>>>,
    /// Cancels the handshake or the receive loop.
    cancel: CancellationToken,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("connection_id", &self.connection_id())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Constructors
// ============================================================================

impl Connection {
    /// Creates an idle connection with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ConnectionOptions::default())
    }

    /// Creates an idle connection with the given options.
    #[must_use]
    pub fn with_options(options: ConnectionOptions) -> Self {
        Self {
            options,
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            connection_id: Arc::new(RwLock::new(None)),
            registry: HandlerRegistry::new(),
            error_handler: Arc::new(Mutex::new(None)),
            command_tx: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
        }
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Returns `true` while the receive loop is running and no close was sent.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns the server-assigned connection id.
    ///
    /// `None` until the server sends a `ConnectionEvent`.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id.read().clone()
    }

    /// Returns the handler registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }
}

// ============================================================================
// Connection - Handlers
// ============================================================================

impl Connection {
    /// Registers a handler for invocations of `method_name`.
    ///
    /// The handler receives the invocation's arguments in order. It runs on
    /// the receive loop, so it must return quickly.
    ///
    /// Registering the same name twice replaces the earlier handler.
    pub fn on<F>(&self, method_name: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.on_with_parameters(method_name, Vec::<String>::new(), handler);
    }

    /// Registers a handler along with its declared parameter type names.
    ///
    /// The type names are metadata; arguments are not checked against them.
    pub fn on_with_parameters<F, I, S>(
        &self,
        method_name: impl Into<String>,
        parameter_types: I,
        handler: F,
    ) where
        F: Fn(&[Value]) + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parameter_types = parameter_types.into_iter().map(Into::into).collect();
        self.registry.register(
            method_name,
            InvocationHandler::new(Arc::new(handler), parameter_types),
        );
    }

    /// Sets the callback for failures inside the receive loop.
    ///
    /// Replaces any previous callback.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        let handler: ErrorHandler = Arc::new(handler);
        *self.error_handler.lock() = Some(handler);
    }

    /// Removes the error callback.
    pub fn clear_error_handler(&self) {
        *self.error_handler.lock() = None;
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Connects and runs the receive loop until the connection closes.
    ///
    /// Returns only after the loop terminates. Use [`start`](Self::start)
    /// to keep control while the loop runs in the background.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUri`] if `uri` is not a `ws`/`wss` URL
    /// - [`Error::InvalidState`] if the connection is not idle
    /// - [`Error::Connection`] if the handshake fails
    /// - [`Error::ConnectionTimeout`] if the handshake exceeds its deadline
    /// - [`Error::Cancelled`] if [`cancel`](Self::cancel) interrupts the handshake
    /// - [`Error::WebSocket`] if the socket fails mid-session
    pub async fn connect(&self, uri: &str) -> Result<()> {
        self.start(uri).await?.wait().await
    }

    /// Connects and spawns the receive loop in the background.
    ///
    /// Returns once the connection is `Open`. On failure the connection is
    /// left without a connection id or running loop.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect), except socket failures after the
    /// handshake surface through [`ReceiveLoop::wait`].
    pub async fn start(&self, uri: &str) -> Result<ReceiveLoop> {
        let url = parse_uri(uri)?;

        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Idle {
                return Err(Error::invalid_state("connect", *state));
            }
            *state = ConnectionState::Connecting;
        }

        debug!(uri = %url, "Connecting");

        let ws_stream = match self.open_transport(&url).await {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                let next = if matches!(e, Error::Cancelled) {
                    ConnectionState::Closed
                } else {
                    ConnectionState::Idle
                };
                *self.state.lock() = next;

                warn!(uri = %url, error = %e, "Connection attempt failed");
                return Err(e);
            }
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.command_tx.lock() = Some(command_tx);
        *self.state.lock() = ConnectionState::Open;

        info!(uri = %url, "WebSocket connection established");

        Ok(receiver::spawn(
            ws_stream,
            command_rx,
            self.loop_context(),
            self.cancel.clone(),
        ))
    }

    /// Starts a graceful close with normal-closure status.
    ///
    /// Does not wait for the server to acknowledge. The receive loop finishes
    /// once the server's close frame arrives. Calling `stop` again while
    /// closing or closed does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the connection never opened.
    pub fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                ConnectionState::Idle | ConnectionState::Connecting => {
                    return Err(Error::not_connected(*state));
                }
                ConnectionState::Closing | ConnectionState::Closed => return Ok(()),
                ConnectionState::Open => *state = ConnectionState::Closing,
            }
        }

        let command_tx = self.command_tx.lock().clone();
        if let Some(command_tx) = command_tx
            && command_tx.send(ConnectionCommand::Close).is_err()
        {
            debug!("Receive loop already terminated");
        }

        debug!("Close requested");
        Ok(())
    }

    /// Cancels the handshake or the receive loop.
    ///
    /// Unlike [`stop`](Self::stop), no close frame is sent. The connection
    /// ends up `Closed` either way.
    pub fn cancel(&self) {
        self.cancel.cancel();

        let mut state = self.state.lock();
        if *state == ConnectionState::Idle {
            *state = ConnectionState::Closed;
        }
    }
}

// ============================================================================
// Connection - Internals
// ============================================================================

impl Connection {
    /// Performs the WebSocket handshake, honoring deadline and cancellation.
    async fn open_transport(&self, url: &Url) -> Result<WsStream> {
        let connect =
            connect_async_with_config(url.as_str(), self.options.websocket_config(), false);

        let handshake_failed =
            |e: WsError| Error::connection(format!("WebSocket handshake failed: {e}"));

        let handshake = async {
            match self.options.handshake_timeout {
                Some(limit) => match timeout(limit, connect).await {
                    Ok(result) => result.map_err(handshake_failed),
                    Err(_) => Err(Error::connection_timeout(
                        u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    )),
                },
                None => connect.await.map_err(handshake_failed),
            }
        };

        tokio::select! {
            biased;

            () = self.cancel.cancelled() => Err(Error::Cancelled),

            result = handshake => {
                let (ws_stream, response) = result?;
                debug!(status = %response.status(), "Handshake completed");
                Ok(ws_stream)
            }
        }
    }

    /// Builds the shared state handed to the receive loop.
    fn loop_context(&self) -> LoopContext {
        LoopContext {
            state: Arc::clone(&self.state),
            connection_id: Arc::clone(&self.connection_id),
            registry: self.registry.clone(),
            error_handler: Arc::clone(&self.error_handler),
            policy: self.options.protocol_error_policy,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses and checks a server URI.
fn parse_uri(uri: &str) -> Result<Url> {
    let url = Url::parse(uri).map_err(|e| Error::invalid_uri(uri, e.to_string()))?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(Error::invalid_uri(
            uri,
            format!("unsupported scheme '{other}', expected ws or wss"),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================
