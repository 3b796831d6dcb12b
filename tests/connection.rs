//! End-to-end tests against an in-process WebSocket server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use websocket_manager_client::{
    Connection, ConnectionOptions, ConnectionState, Error, InvocationDescriptor,
    ProtocolErrorPolicy,
};

use common::{close_and_drain, drain, send_connection_event, send_invocation, serve};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Collects every call's arguments.
type Calls = Arc<Mutex<Vec<Vec<Value>>>>;

fn record(connection: &Connection, method: &str) -> Calls {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let calls_clone = Arc::clone(&calls);
    connection.on(method, move |args| calls_clone.lock().push(args.to_vec()));
    calls
}

fn collect_errors(connection: &Connection) -> Arc<Mutex<Vec<String>>> {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = Arc::clone(&errors);
    connection.on_error(move |e| errors_clone.lock().push(e.to_string()));
    errors
}

#[tokio::test]
async fn test_broadcast_scenario() {
    let (url, server) = serve(|mut ws| async move {
        send_connection_event(&mut ws, "abc123").await;
        send_invocation(
            &mut ws,
            &InvocationDescriptor::new("Broadcast", vec![json!("hello")]),
        )
        .await;
        close_and_drain(ws).await;
    })
    .await;

    let connection = Connection::new();
    let calls = record(&connection, "Broadcast");

    timeout(TIMEOUT, connection.connect(&url))
        .await
        .expect("loop finished")
        .expect("clean close");

    assert_eq!(*calls.lock(), vec![vec![json!("hello")]]);
    assert_eq!(
        connection.connection_id().map(|id| id.into_inner()),
        Some("abc123".to_string())
    );
    assert_eq!(connection.state(), ConnectionState::Closed);

    server.await.expect("server");
}

#[tokio::test]
async fn test_raw_wire_frames() {
    let (url, server) = serve(|mut ws| async move {
        ws.send(WsMessage::text(r#"{"messageType":2,"data":"numeric-id"}"#))
            .await
            .expect("send");
        ws.send(WsMessage::text(
            r#"{"messageType":1,"data":"{\"methodName\":\"Broadcast\",\"arguments\":[\"hi\",2]}"}"#,
        ))
        .await
        .expect("send");
        close_and_drain(ws).await;
    })
    .await;

    let connection = Connection::new();
    let calls = record(&connection, "Broadcast");

    timeout(TIMEOUT, connection.connect(&url))
        .await
        .expect("loop finished")
        .expect("clean close");

    assert_eq!(*calls.lock(), vec![vec![json!("hi"), json!(2)]]);
    assert_eq!(
        connection.connection_id().map(|id| id.into_inner()),
        Some("numeric-id".to_string())
    );

    server.await.expect("server");
}

#[tokio::test]
async fn test_frames_processed_in_arrival_order() {
    let (url, server) = serve(|mut ws| async move {
        send_connection_event(&mut ws, "first").await;
        for i in 0..50 {
            send_invocation(&mut ws, &InvocationDescriptor::new("Append", vec![json!(i)])).await;
        }
        send_connection_event(&mut ws, "second").await;
        close_and_drain(ws).await;
    })
    .await;

    let connection = Connection::new();

    // Each invocation also records the id set by the frame before it
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::new(Mutex::new(Vec::new()));
    let calls_clone = Arc::clone(&calls);
    let observed_clone = Arc::clone(&observed);
    let observer = connection.clone();
    connection.on("Append", move |args| {
        calls_clone.lock().push(args.to_vec());
        observed_clone.lock().push(observer.connection_id());
    });

    timeout(TIMEOUT, connection.connect(&url))
        .await
        .expect("loop finished")
        .expect("clean close");

    let expected: Vec<Vec<Value>> = (0..50).map(|i| vec![json!(i)]).collect();
    assert_eq!(*calls.lock(), expected);
    assert!(
        observed
            .lock()
            .iter()
            .all(|id| id.as_ref().map(|id| id.as_str()) == Some("first"))
    );
    assert_eq!(
        connection.connection_id().map(|id| id.into_inner()),
        Some("second".to_string())
    );

    server.await.expect("server");
}

#[tokio::test]
async fn test_unknown_method_does_not_close_connection() {
    let (url, server) = serve(|mut ws| async move {
        send_invocation(&mut ws, &InvocationDescriptor::new("Missing", vec![json!(1)])).await;
        send_invocation(&mut ws, &InvocationDescriptor::new("Known", vec![json!(2)])).await;
        close_and_drain(ws).await;
    })
    .await;

    let connection = Connection::new();
    let calls = record(&connection, "Known");
    let errors = collect_errors(&connection);

    timeout(TIMEOUT, connection.connect(&url))
        .await
        .expect("loop finished")
        .expect("clean close");

    assert_eq!(*errors.lock(), vec!["Unknown method: Missing".to_string()]);
    assert_eq!(*calls.lock(), vec![vec![json!(2)]]);

    server.await.expect("server");
}

#[tokio::test]
async fn test_panicking_handler_is_reported_and_loop_continues() {
    let (url, server) = serve(|mut ws| async move {
        send_invocation(&mut ws, &InvocationDescriptor::new("Boom", vec![])).await;
        send_connection_event(&mut ws, "after-panic").await;
        close_and_drain(ws).await;
    })
    .await;

    let connection = Connection::with_options(
        ConnectionOptions::new().with_protocol_error_policy(ProtocolErrorPolicy::Terminate),
    );
    connection.on("Boom", |_: &[Value]| panic!("handler bug"));
    let errors = collect_errors(&connection);

    timeout(TIMEOUT, connection.connect(&url))
        .await
        .expect("loop finished")
        .expect("clean close");

    assert_eq!(
        *errors.lock(),
        vec!["Handler for Boom panicked: handler bug".to_string()]
    );
    assert_eq!(
        connection.connection_id().map(|id| id.into_inner()),
        Some("after-panic".to_string())
    );
    assert_eq!(connection.state(), ConnectionState::Closed);

    server.await.expect("server");
}

#[tokio::test]
async fn test_cleared_error_handler_is_not_called() {
    let (url, server) = serve(|mut ws| async move {
        send_invocation(&mut ws, &InvocationDescriptor::new("Missing", vec![])).await;
        send_connection_event(&mut ws, "quiet").await;
        close_and_drain(ws).await;
    })
    .await;

    let connection = Connection::new();
    let errors = collect_errors(&connection);
    connection.clear_error_handler();

    timeout(TIMEOUT, connection.connect(&url))
        .await
        .expect("loop finished")
        .expect("clean close");

    assert!(errors.lock().is_empty());
    assert_eq!(
        connection.connection_id().map(|id| id.into_inner()),
        Some("quiet".to_string())
    );
    assert_eq!(connection.state(), ConnectionState::Closed);

    server.await.expect("server");
}

#[tokio::test]
async fn test_malformed_frame_is_reported_and_skipped() {
    let (url, server) = serve(|mut ws| async move {
        ws.send(WsMessage::text("this is not json")).await.expect("send");
        ws.send(WsMessage::text(
            r#"{"messageType":"ClientMethodInvocation","data":"{broken"}"#,
        ))
        .await
        .expect("send");
        ws.send(WsMessage::text(r#"{"messageType":"Heartbeat","data":""}"#))
            .await
            .expect("send");
        send_connection_event(&mut ws, "still-alive").await;
        close_and_drain(ws).await;
    })
    .await;

    let connection = Connection::new();
    let errors = collect_errors(&connection);

    timeout(TIMEOUT, connection.connect(&url))
        .await
        .expect("loop finished")
        .expect("clean close");

    let errors = errors.lock();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.starts_with("Protocol error:")));
    assert_eq!(
        connection.connection_id().map(|id| id.into_inner()),
        Some("still-alive".to_string())
    );

    server.await.expect("server");
}

#[tokio::test]
async fn test_terminate_policy_closes_on_malformed_frame() {
    let (url, server) = serve(|mut ws| async move {
        ws.send(WsMessage::text("garbage")).await.expect("send");

        let frame = loop {
            match ws.next().await {
                Some(Ok(WsMessage::Close(frame))) => break frame,
                Some(Ok(_)) => {}
                other => panic!("expected close frame, got {other:?}"),
            }
        };
        assert_eq!(frame.map(|f| f.code), Some(CloseCode::Normal));

        drain(ws).await;
    })
    .await;

    let connection = Connection::with_options(
        ConnectionOptions::new().with_protocol_error_policy(ProtocolErrorPolicy::Terminate),
    );
    let errors = collect_errors(&connection);

    timeout(TIMEOUT, connection.connect(&url))
        .await
        .expect("loop finished")
        .expect("clean close");

    assert_eq!(errors.lock().len(), 1);
    assert_eq!(connection.state(), ConnectionState::Closed);

    server.await.expect("server");
}

#[tokio::test]
async fn test_stop_before_any_frames() {
    let (url, server) = serve(|mut ws| async move {
        match ws.next().await {
            Some(Ok(WsMessage::Close(Some(frame)))) => {
                assert_eq!(frame.code, CloseCode::Normal);
                assert_eq!(frame.reason.as_str(), "");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
        drain(ws).await;
    })
    .await;

    let connection = Connection::new();
    let calls = record(&connection, "Broadcast");

    let receive_loop = connection.start(&url).await.expect("start");
    assert_eq!(connection.state(), ConnectionState::Open);

    connection.stop().expect("stop");
    assert_eq!(connection.state(), ConnectionState::Closing);

    // Second stop is a no-op
    connection.stop().expect("stop again");

    timeout(TIMEOUT, receive_loop.wait())
        .await
        .expect("loop finished")
        .expect("clean close");

    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(calls.lock().is_empty());
    assert!(connection.connection_id().is_none());

    server.await.expect("server");
}

#[tokio::test]
async fn test_cancel_open_connection() {
    let (url, server) = serve(|ws| async move {
        drain(ws).await;
    })
    .await;

    let connection = Connection::new();
    let receive_loop = connection.start(&url).await.expect("start");

    connection.cancel();

    timeout(TIMEOUT, receive_loop.wait())
        .await
        .expect("loop finished")
        .expect("cancelled cleanly");

    assert_eq!(connection.state(), ConnectionState::Closed);

    timeout(TIMEOUT, server)
        .await
        .expect("server finished")
        .expect("server");
}

#[tokio::test]
async fn test_receive_loop_handle_cancel() {
    let (url, server) = serve(|ws| async move {
        drain(ws).await;
    })
    .await;

    let connection = Connection::new();
    let receive_loop = connection.start(&url).await.expect("start");
    assert!(!receive_loop.is_finished());

    receive_loop.cancel();

    timeout(TIMEOUT, receive_loop.wait())
        .await
        .expect("loop finished")
        .expect("cancelled cleanly");
    assert_eq!(connection.state(), ConnectionState::Closed);

    let _ = timeout(TIMEOUT, server).await;
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let (url, server) = serve(|ws| async move {
        drain(ws).await;
    })
    .await;

    let connection = Connection::new();
    let receive_loop = connection.start(&url).await.expect("start");

    let err = connection.start(&url).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            state: ConnectionState::Open,
            ..
        }
    ));

    connection.stop().expect("stop");
    let _ = timeout(TIMEOUT, receive_loop.wait()).await;
    let _ = timeout(TIMEOUT, server).await;
}

#[tokio::test]
async fn test_abrupt_disconnect_closes_connection() {
    let (url, server) = serve(|ws| async move {
        // Drop the socket without a close handshake
        drop(ws);
    })
    .await;

    let connection = Connection::new();
    let receive_loop = connection.start(&url).await.expect("start");

    let result = timeout(TIMEOUT, receive_loop.wait())
        .await
        .expect("loop finished");

    assert!(matches!(result, Ok(()) | Err(Error::WebSocket(_))));
    assert_eq!(connection.state(), ConnectionState::Closed);

    server.await.expect("server");
}
