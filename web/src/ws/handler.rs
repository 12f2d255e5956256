use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::*;
use realtime::{ConnectionId, Hub};
use service::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Server-initiated ping cadence. Keeps intermediaries from reaping idle
/// connections; disconnect detection itself rides on the read loop.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// GET /ws
/// WebSocket upgrade endpoint establishing the long-lived bidirectional
/// connection for real-time events. One connection per browser session;
/// identification happens in-band via a `user:join` frame, so a fresh
/// connection starts unidentified and receives nothing until it does.
pub(crate) async fn ws_upgrade(State(app_state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state.hub.clone()))
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let connection_id = ConnectionId::new();

    debug!("WebSocket connection {} established", connection_id.as_str());

    // Writer task: owns the sink and forwards frames from the outbox, so
    // any part of the hub can reach this client by cloning the sender.
    let writer = tokio::spawn(write_loop(sink, rx));

    // Keepalive pings ride the same outbox; the task ends once it closes.
    let ping_tx = tx.clone();
    let keepalive = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PING_INTERVAL);
        ticker.tick().await; // skip the immediate first tick
        loop {
            ticker.tick().await;
            if ping_tx.send(Message::Ping(Vec::new())).is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => hub.handle_inbound(&connection_id, &tx, &text).await,
            Ok(Message::Ping(payload)) => {
                let _ = tx.send(Message::Pong(payload));
            }
            Ok(Message::Pong(_)) => {}
            Ok(Message::Binary(_)) => {
                debug!(
                    "ignoring binary frame on connection {}",
                    connection_id.as_str()
                );
            }
            Ok(Message::Close(frame)) => {
                debug!(
                    "connection {} closed by client: {frame:?}",
                    connection_id.as_str()
                );
                break;
            }
            Err(err) => {
                warn!(
                    "receive error on connection {}: {err}",
                    connection_id.as_str()
                );
                break;
            }
        }
    }

    // Transport gone: Closed-state cleanup. The hub announces user:offline
    // only if this connection was still the user's current one.
    hub.disconnect(&connection_id);
    keepalive.abort();
    writer.abort();

    debug!("WebSocket connection {} cleaned up", connection_id.as_str());
}

async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut rx: UnboundedReceiver<Message>) {
    while let Some(message) = rx.recv().await {
        if sink.send(message).await.is_err() {
            // The socket is broken; the read loop will observe it too.
            break;
        }
    }
}
