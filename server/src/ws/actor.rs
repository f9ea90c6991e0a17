use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{error::Elapsed, timeout};

use crate::state::AppState;
use crate::ws::protocol;
use crate::ws::{ConnectionHandle, CLOSE_SUPERSEDED};

/// How long teardown waits for the writer to flush its close frame.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Why a session left the `Active` state.
#[derive(Debug)]
enum SessionEnd {
    /// Peer sent a close frame
    PeerClosed,
    /// Stream ended without a close frame
    StreamEnded,
    /// Socket read error
    Transport(String),
    /// Frame could not be decoded
    Decode(String),
    /// No inbound frame within the configured idle timeout
    IdleTimeout,
    /// Closed through the handle (superseded or undeliverable)
    Closed,
    /// Writer task stopped, so the socket can no longer be written
    WriterGone,
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::StreamEnded => write!(f, "stream ended"),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Decode(e) => write!(f, "decode error: {}", e),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::Closed => write!(f, "closed by server"),
            Self::WriterGone => write!(f, "writer stopped"),
        }
    }
}

/// Run the actor-per-connection pattern for one player.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop (this task): decodes frames and dispatches them
///
/// The session registers itself on entry (closing any connection it replaces)
/// and on exit removes its registry entry, position and adjacency pairs, unless a
/// newer connection for the same player has already taken over.
pub async fn run_connection(socket: WebSocket, state: AppState, player: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let handle = ConnectionHandle::new(tx);

    if let Some(previous) = state.connections.register(&player, handle.clone()) {
        tracing::info!(
            player = %player,
            connection = previous.id(),
            "Closing superseded connection"
        );
        previous.close(CLOSE_SUPERSEDED, "Replaced by a newer connection");
    }
    // Queued ahead of this session's first move, so a reconnect starts with no position.
    state.presence.claim(&player, handle.id());

    tracing::info!(
        player = %player,
        connection = handle.id(),
        "WebSocket session started"
    );

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));
    let mut writer_done = false;

    let end = loop {
        let frame = tokio::select! {
            _ = handle.closed() => break SessionEnd::Closed,
            _ = &mut writer_handle => {
                writer_done = true;
                break SessionEnd::WriterGone;
            }
            frame = read_frame(&mut ws_receiver, state.idle_timeout) => frame,
        };

        let msg = match frame {
            Err(_) => break SessionEnd::IdleTimeout,
            Ok(None) => break SessionEnd::StreamEnded,
            Ok(Some(Err(e))) => break SessionEnd::Transport(e.to_string()),
            Ok(Some(Ok(msg))) => msg,
        };

        let decoded = match msg {
            Message::Text(text) => protocol::decode_frame(text.as_str().as_bytes()),
            Message::Binary(data) => protocol::decode_frame(&data),
            // The socket answers pings on its own.
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(frame) => {
                tracing::debug!(player = %player, reason = ?frame, "Client initiated close");
                break SessionEnd::PeerClosed;
            }
        };

        match decoded {
            Ok(inbound) => protocol::dispatch(inbound, &state, &player, handle.id()),
            Err(e) => break SessionEnd::Decode(e.to_string()),
        }
    };

    match &end {
        SessionEnd::Decode(_) | SessionEnd::Transport(_) | SessionEnd::IdleTimeout => {
            tracing::warn!(player = %player, reason = %end, "WebSocket session ending");
        }
        _ => {
            tracing::debug!(player = %player, reason = %end, "WebSocket session ending");
        }
    }

    if state.connections.release(&player, handle.id()) {
        state.presence.remove_player(&player, handle.id());
    } else {
        tracing::debug!(player = %player, "Newer connection owns this player, presence kept");
    }

    // Let the writer flush a close frame, then make sure it is gone.
    if !writer_done {
        let _ = handle.send(Message::Close(None));
        if timeout(WRITER_DRAIN, &mut writer_handle).await.is_err() {
            writer_handle.abort();
        }
    }

    tracing::info!(
        player = %player,
        connection = handle.id(),
        "WebSocket session closed"
    );
}

/// Next inbound frame, bounded by the idle timeout when one is configured.
async fn read_frame(
    ws_receiver: &mut SplitStream<WebSocket>,
    idle_timeout: Option<Duration>,
) -> Result<Option<Result<Message, axum::Error>>, Elapsed> {
    match idle_timeout {
        Some(limit) => timeout(limit, ws_receiver.next()).await,
        None => Ok(ws_receiver.next().await),
    }
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
/// Stops after a close frame or the first failed write.
async fn writer_task(mut ws_sender: SplitSink<WebSocket, Message>, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() {
            break;
        }
        if closing {
            break;
        }
    }
    let _ = ws_sender.close().await;
}
