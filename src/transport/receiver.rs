//! Receive loop.
//!
//! One tokio task per open connection reads frames in arrival order and
//! routes each text frame:
//!
//! - `ConnectionEvent` stores the payload as the connection id
//! - `ClientMethodInvocation` decodes the payload and dispatches it
//! - any other discriminator is ignored
//!
//! The task owns both halves of the socket. Close frames are only ever
//! written from inside the loop, at most once.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::dispatch::HandlerRegistry;
use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::{InvocationDescriptor, Message, MessageType};

use super::connection::{ConnectionState, ErrorHandler};
use super::options::ProtocolErrorPolicy;

// ============================================================================
// Types
// ============================================================================

/// Client WebSocket stream.
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the client stream.
type WsSink = SplitSink<WsStream, WsMessage>;

/// Commands from the public API to the loop.
pub(crate) enum ConnectionCommand {
    /// Send a normal-closure close frame.
    Close,
}

// ============================================================================
// ReceiveLoop
// ============================================================================

/// Handle to a running receive loop.
///
/// Dropping the handle detaches the loop; it keeps running until the
/// connection closes.
#[derive(Debug)]
pub struct ReceiveLoop {
    /// Task running the loop.
    handle: JoinHandle<Result<()>>,
    /// Connection-wide cancellation token.
    cancel: CancellationToken,
}

impl ReceiveLoop {
    pub(crate) fn new(handle: JoinHandle<Result<()>>, cancel: CancellationToken) -> Self {
        Self { handle, cancel }
    }

    /// Waits for the loop to terminate.
    ///
    /// Resolves to `Ok(())` after a close handshake, end of stream, or
    /// cancellation.
    ///
    /// # Errors
    ///
    /// - [`Error::WebSocket`] if the socket failed mid-session
    /// - [`Error::Task`] if the loop task panicked
    pub async fn wait(self) -> Result<()> {
        self.handle.await?
    }

    /// Stops the loop without a close handshake.
    #[inline]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once the loop has terminated.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// ============================================================================
// LoopContext
// ============================================================================

/// Connection state shared with the loop.
pub(crate) struct LoopContext {
    pub(crate) state: Arc<Mutex<ConnectionState>>,
    pub(crate) connection_id: Arc<RwLock<Option<ConnectionId>>>,
    pub(crate) registry: HandlerRegistry,
    pub(crate) error_handler: Arc<Mutex<Option<ErrorHandler>>>,
    pub(crate) policy: ProtocolErrorPolicy,
}

impl LoopContext {
    /// Decodes one text frame and applies its effect.
    pub(crate) fn handle_text(&self, text: &str) -> Result<()> {
        let message = Message::decode(text)?;
        trace!(message_type = %message.message_type, "Message received");

        match message.message_type {
            MessageType::ConnectionEvent => {
                debug!(connection_id = %message.data, "Connection id assigned");
                *self.connection_id.write() = Some(ConnectionId::from(message.data));
            }

            MessageType::ClientMethodInvocation => {
                let descriptor = InvocationDescriptor::decode(&message.data)?;
                self.registry.dispatch(&descriptor)?;
            }

            MessageType::Text | MessageType::Unknown(_) => {
                debug!(message_type = %message.message_type, "Ignoring message");
            }
        }

        Ok(())
    }

    /// Logs an in-loop failure and passes it to the error handler.
    pub(crate) fn report(&self, error: &Error) {
        warn!(error = %error, "Failed to handle message");

        let handler = self.error_handler.lock().clone();
        if let Some(handler) = handler {
            handler(error);
        }
    }

    /// Returns `true` if `error` should end the session.
    fn is_fatal(&self, error: &Error) -> bool {
        self.policy == ProtocolErrorPolicy::Terminate && !error.is_dispatch_error()
    }
}

// ============================================================================
// Loop
// ============================================================================

/// Spawns the receive loop for an open stream.
pub(crate) fn spawn(
    ws_stream: WsStream,
    command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    context: LoopContext,
    cancel: CancellationToken,
) -> ReceiveLoop {
    let handle = tokio::spawn(run_receive_loop(
        ws_stream,
        command_rx,
        context,
        cancel.clone(),
    ));

    ReceiveLoop::new(handle, cancel)
}

/// Reads and routes frames until the connection leaves `Open`.
async fn run_receive_loop(
    ws_stream: WsStream,
    mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    context: LoopContext,
    cancel: CancellationToken,
) -> Result<()> {
    let _closed = ClosedOnExit(Arc::clone(&context.state));
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut close_sent = false;
    let mut commands_open = true;
    let mut outcome = Ok(());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("Receive loop cancelled");
                break;
            }

            command = command_rx.recv(), if commands_open => {
                match command {
                    Some(ConnectionCommand::Close) => {
                        send_close(&mut ws_write, &mut close_sent, &context.state).await;
                    }

                    None => {
                        debug!("Command channel closed");
                        commands_open = false;
                    }
                }
            }

            message = ws_read.next() => {
                match message {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Err(e) = context.handle_text(text.as_str()) {
                            context.report(&e);

                            if context.is_fatal(&e) {
                                send_close(&mut ws_write, &mut close_sent, &context.state).await;
                            }
                        }
                    }

                    Some(Ok(WsMessage::Close(frame))) => {
                        debug!(?frame, "WebSocket closed by remote");
                        send_close(&mut ws_write, &mut close_sent, &context.state).await;
                        break;
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        outcome = Err(Error::WebSocket(e));
                        break;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }

                    // Ignore Binary, Ping, Pong, raw frames
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!("Receive loop terminated");

    outcome
}

/// Marks the connection `Closed` when the loop exits, including by unwinding.
struct ClosedOnExit(Arc<Mutex<ConnectionState>>);

impl Drop for ClosedOnExit {
    fn drop(&mut self) {
        *self.0.lock() = ConnectionState::Closed;
    }
}

/// Sends a normal-closure close frame unless one was already sent.
async fn send_close(
    ws_write: &mut WsSink,
    close_sent: &mut bool,
    state: &Mutex<ConnectionState>,
) {
    if *close_sent {
        return;
    }
    *close_sent = true;

    {
        let mut state = state.lock();
        if *state == ConnectionState::Open {
            *state = ConnectionState::Closing;
        }
    }

    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    };

    // Echoing after a remote close may report the socket as already closed.
    if let Err(e) = ws_write.send(WsMessage::Close(Some(frame))).await {
        debug!(error = %e, "Close frame not sent");
    } else {
        trace!("Close frame sent");
    }
}

// ============================================================================
// Tests
// ============================================================================
