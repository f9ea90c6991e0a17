//! Integration tests for WebSocket sessions: presence broadcasts, proximity
//! transitions, direct chat, teardown and connection replacement.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use tilesync_server::directory::{SpawnPoint, SqliteDirectory};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Helper: start the server on a random port with an in-memory directory.
async fn start_test_server(idle_timeout: Option<Duration>) -> SocketAddr {
    let db = tilesync_server::db::init_memory_db().expect("Failed to init DB");
    let directory = Arc::new(SqliteDirectory::new(
        db,
        SpawnPoint {
            row: 0,
            col: 7,
            room_id: "room1".to_string(),
        },
    ));
    let state =
        tilesync_server::state::AppState::start(directory.clone(), directory, idle_timeout);

    let app = tilesync_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

async fn connect(addr: SocketAddr, username: &str) -> (WsWrite, WsRead) {
    let url = format!("ws://{}/ws?username={}", addr, username);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream.split()
}

async fn send_json(write: &mut WsWrite, value: Value) {
    write
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send frame");
}

async fn send_move(write: &mut WsWrite, username: &str, row: i64, col: i64) {
    send_json(write, json!({ "type": "move", "username": username, "row": row, "col": col })).await;
}

/// Next JSON event, skipping control frames.
async fn next_event(read: &mut WsRead) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Expected an event within timeout");
        match msg {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(text.as_str()).expect("Event is not JSON");
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            other => panic!("Expected text event, got: {:?}", other),
        }
    }
}

/// Assert nothing arrives for a short while.
async fn assert_silent(read: &mut WsRead) {
    let result = tokio::time::timeout(Duration::from_millis(300), read.next()).await;
    assert!(result.is_err(), "Expected no message, got: {:?}", result);
}

/// Assert the server closes the connection.
async fn assert_closed(read: &mut WsRead) {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(3), read.next())
            .await
            .expect("Expected the server to close the connection");
        match msg {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
            Some(Ok(Message::Text(_))) => continue,
            other => panic!("Expected close, got: {:?}", other),
        }
    }
}

/// Connect and move, waiting for the own move echo so the session is known to be registered.
async fn join(addr: SocketAddr, username: &str, row: i64, col: i64) -> (WsWrite, WsRead) {
    let (mut write, mut read) = connect(addr, username).await;
    send_move(&mut write, username, row, col).await;
    loop {
        let event = next_event(&mut read).await;
        if event["type"] == "move" && event["username"] == username {
            return (write, read);
        }
    }
}

async fn presence(addr: SocketAddr) -> Value {
    reqwest::get(format!("http://{}/api/presence", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

fn proximity(subject: &str, target: &str, action: &str) -> Value {
    json!({ "type": "proximity", "username": subject, "target": target, "action": action })
}

#[tokio::test]
async fn test_ws_missing_username_is_rejected() {
    let addr = start_test_server(None).await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr)).await;
    assert!(result.is_err(), "Upgrade without username should fail");

    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws?username=", addr)).await;
    assert!(result.is_err(), "Upgrade with empty username should fail");
}

#[tokio::test]
async fn test_ws_approach_and_leave_scenario() {
    let addr = start_test_server(None).await;

    let (_write_a, mut read_a) = join(addr, "alice", 0, 0).await;
    let (mut write_b, mut read_b) = join(addr, "bob", 0, 1).await;

    // Alice saw the approach pair and bob's move; bob's join already consumed his move echo,
    // which came after the approach pair, so bob's approaches were skipped by `join`.
    assert_eq!(next_event(&mut read_a).await, proximity("bob", "alice", "approach"));
    assert_eq!(next_event(&mut read_a).await, proximity("alice", "bob", "approach"));
    assert_eq!(
        next_event(&mut read_a).await,
        json!({ "type": "move", "username": "bob", "row": 0, "col": 1 })
    );

    send_move(&mut write_b, "bob", 5, 5).await;
    for read in [&mut read_a, &mut read_b] {
        assert_eq!(next_event(read).await, proximity("bob", "alice", "leave"));
        assert_eq!(next_event(read).await, proximity("alice", "bob", "leave"));
        assert_eq!(
            next_event(read).await,
            json!({ "type": "move", "username": "bob", "row": 5, "col": 5 })
        );
    }

    // Same position again: only the move.
    send_move(&mut write_b, "bob", 5, 5).await;
    for read in [&mut read_a, &mut read_b] {
        assert_eq!(next_event(read).await["type"], "move");
        assert_silent(read).await;
    }
}

#[tokio::test]
async fn test_ws_connection_identity_is_authoritative() {
    let addr = start_test_server(None).await;

    let (mut write, mut read) = connect(addr, "alice").await;
    send_move(&mut write, "mallory", 3, 4).await;

    let event = next_event(&mut read).await;
    assert_eq!(event["username"], "alice");
    assert_eq!(event["row"], 3);
    assert_eq!(event["col"], 4);
}

#[tokio::test]
async fn test_ws_chat_reaches_only_recipient() {
    let addr = start_test_server(None).await;

    let (mut write_a, mut read_a) = join(addr, "alice", 0, 0).await;
    let (_write_b, mut read_b) = join(addr, "bob", 10, 10).await;
    let (_write_c, mut read_c) = join(addr, "carol", 20, 20).await;

    // Drain the move broadcasts each of them saw from later joiners.
    assert_eq!(next_event(&mut read_a).await["username"], "bob");
    assert_eq!(next_event(&mut read_a).await["username"], "carol");
    assert_eq!(next_event(&mut read_b).await["username"], "carol");

    send_json(
        &mut write_a,
        json!({ "type": "chat", "sender": "alice", "recipient": "bob", "message": "hello bob" }),
    )
    .await;

    assert_eq!(
        next_event(&mut read_b).await,
        json!({
            "type": "chat",
            "username": "",
            "sender": "alice",
            "recipient": "bob",
            "message": "hello bob",
        })
    );
    assert_silent(&mut read_a).await;
    assert_silent(&mut read_c).await;
}

#[tokio::test]
async fn test_ws_chat_to_offline_recipient_is_dropped() {
    let addr = start_test_server(None).await;

    let (mut write, mut read) = join(addr, "alice", 0, 0).await;
    send_json(
        &mut write,
        json!({ "type": "chat", "recipient": "nobody", "message": "anyone?" }),
    )
    .await;
    assert_silent(&mut read).await;

    // Chat did not move alice or break the session.
    send_move(&mut write, "alice", 0, 1).await;
    assert_eq!(next_event(&mut read).await["col"], 1);
    assert_eq!(presence(addr).await, json!([{ "username": "alice", "row": 0, "col": 1 }]));
}

#[tokio::test]
async fn test_ws_disconnect_purges_presence_and_adjacency() {
    let addr = start_test_server(None).await;

    let (mut write_a, mut read_a) = join(addr, "alice", 0, 0).await;
    let (mut write_b, _read_b) = join(addr, "bob", 0, 1).await;
    for _ in 0..3 {
        next_event(&mut read_a).await;
    }

    write_b.send(Message::Close(None)).await.expect("Failed to send close");
    drop(write_b);

    let mut remaining = Value::Null;
    for _ in 0..20 {
        remaining = presence(addr).await;
        if remaining.as_array().map(|a| a.len()) == Some(1) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(remaining, json!([{ "username": "alice", "row": 0, "col": 0 }]));

    // Moving away from bob's old cell emits no leave for bob.
    send_move(&mut write_a, "alice", 4, 4).await;
    assert_eq!(
        next_event(&mut read_a).await,
        json!({ "type": "move", "username": "alice", "row": 4, "col": 4 })
    );
    assert_silent(&mut read_a).await;
}

#[tokio::test]
async fn test_ws_reconnect_replaces_previous_connection() {
    let addr = start_test_server(None).await;

    let (_write_a, mut read_a) = join(addr, "alice", 0, 0).await;
    let (_write_old, mut read_old) = join(addr, "bob", 0, 1).await;
    loop {
        let event = next_event(&mut read_a).await;
        if event["type"] == "move" && event["username"] == "bob" {
            break;
        }
    }

    let (mut write_new, mut read_new) = connect(addr, "bob").await;
    assert_closed(&mut read_old).await;

    // The new session starts without the old position or adjacency.
    let mut remaining = Value::Null;
    for _ in 0..20 {
        remaining = presence(addr).await;
        if remaining == json!([{ "username": "alice", "row": 0, "col": 0 }]) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(remaining, json!([{ "username": "alice", "row": 0, "col": 0 }]));

    send_move(&mut write_new, "bob", 1, 0).await;
    assert_eq!(next_event(&mut read_a).await, proximity("bob", "alice", "approach"));
    assert_eq!(next_event(&mut read_a).await, proximity("alice", "bob", "approach"));
    assert_eq!(
        next_event(&mut read_a).await,
        json!({ "type": "move", "username": "bob", "row": 1, "col": 0 })
    );
    assert_eq!(next_event(&mut read_new).await, proximity("bob", "alice", "approach"));
}

#[tokio::test]
async fn test_ws_malformed_frame_disconnects() {
    let addr = start_test_server(None).await;

    let (mut write, mut read) = join(addr, "alice", 1, 1).await;
    write
        .send(Message::Text(String::from("this is not json").into()))
        .await
        .expect("Failed to send frame");

    assert_closed(&mut read).await;

    let mut remaining = Value::Null;
    for _ in 0..20 {
        remaining = presence(addr).await;
        if remaining == json!([]) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(remaining, json!([]));
}

#[tokio::test]
async fn test_ws_idle_timeout_closes_session() {
    let addr = start_test_server(Some(Duration::from_millis(500))).await;

    let (_write, mut read) = connect(addr, "sleepy").await;
    assert_closed(&mut read).await;
}

#[tokio::test]
async fn test_ws_ping_pong() {
    let addr = start_test_server(None).await;
    let (mut write, mut read) = connect(addr, "pinger").await;

    write
        .send(Message::Ping(vec![42, 43, 44].into()))
        .await
        .expect("Failed to send ping");

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected pong within timeout");

    match msg {
        Some(Ok(Message::Pong(data))) => {
            assert_eq!(data.as_ref(), &[42, 43, 44], "Pong data should match ping");
        }
        other => panic!("Expected Pong message, got: {:?}", other),
    }

    // Exactly one pong per ping.
    assert_silent(&mut read).await;
}
