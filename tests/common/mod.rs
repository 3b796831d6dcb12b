//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing_subscriber::EnvFilter;

use websocket_manager_client::{InvocationDescriptor, Message};

/// Server side of one test connection.
pub type ServerStream = WebSocketStream<TcpStream>;

/// Installs a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Binds a server on a random port and runs `script` against the first client.
///
/// Returns the `ws://` URL and the server task.
pub async fn serve<F, Fut>(script: F) -> (String, JoinHandle<()>)
where
    F: FnOnce(ServerStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let ws = accept_async(stream).await.expect("upgrade");
        script(ws).await;
    });

    (format!("ws://{addr}"), handle)
}

/// Sends an envelope as a text frame.
pub async fn send_message(ws: &mut ServerStream, message: &Message) {
    let text = message.encode().expect("encode");
    ws.send(WsMessage::text(text)).await.expect("send");
}

/// Sends a `ConnectionEvent` frame.
pub async fn send_connection_event(ws: &mut ServerStream, id: &str) {
    send_message(ws, &Message::connection_event(id)).await;
}

/// Sends a `ClientMethodInvocation` frame.
pub async fn send_invocation(ws: &mut ServerStream, descriptor: &InvocationDescriptor) {
    let message = Message::invocation(descriptor).expect("envelope");
    send_message(ws, &message).await;
}

/// Closes from the server side and drains until the client answers.
pub async fn close_and_drain(mut ws: ServerStream) {
    ws.close(None).await.expect("close");
    drain(ws).await;
}

/// Reads until the stream ends or errors.
pub async fn drain(mut ws: ServerStream) {
    while let Some(Ok(_)) = ws.next().await {}
}
