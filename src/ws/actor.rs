//! Per-connection session lifecycle: register, receive loop, guaranteed
//! cleanup.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chat::presence;
use crate::state::AppState;
use crate::ws::protocol;
use crate::ws::ConnectionSender;

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: processes incoming frames, dispatches to the router
///
/// The mpsc channel allows any part of the system to send messages to this
/// client by cloning the sender; it is also what the registry holds.
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: i64, username: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Spawn writer task: forwards mpsc messages to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let is_first = state.hub.register(user_id, tx.clone());

    // The guard runs cleanup on every exit path out of the receive loop,
    // panics included: unregister, and the offline notification when this
    // was the user's last connection.
    let _guard = SessionGuard {
        state: state.clone(),
        user_id,
        tx: tx.clone(),
        writer: writer_handle,
    };

    if is_first {
        presence::mark_online(&state, user_id).await;
    }

    tracing::info!(user_id, username = %username, "WebSocket session started");

    // Reader loop: one inbound frame at a time, in arrival order.
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_frame(text.as_str(), &state, user_id, &username).await;
                }
                Message::Binary(_) => {
                    tracing::debug!(user_id, "Ignoring binary frame (protocol is JSON text)");
                }
                Message::Ping(data) => {
                    // Respond to client pings with pong
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Pong(_) => {}
                Message::Close(frame) => {
                    tracing::info!(user_id, reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(user_id, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                // Stream ended — client disconnected
                tracing::info!(user_id, "WebSocket stream ended");
                break;
            }
        }
    }
    // SessionGuard drops here and performs cleanup.
}

/// Writer task: receives messages from the mpsc channel and forwards them to
/// the WebSocket sink. Being the sole writer, it serializes all writes to
/// this socket no matter how many dispatch sources cloned the sender.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}

/// Scoped cleanup for an active session. Unregisters the connection and, if
/// it was the user's last, hands the offline transition to the presence
/// notifier on a spawned task (Drop cannot await).
struct SessionGuard {
    state: AppState,
    user_id: i64,
    tx: ConnectionSender,
    writer: JoinHandle<()>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.writer.abort();

        let is_last = self.state.hub.unregister(self.user_id, &self.tx);
        tracing::info!(user_id = self.user_id, "WebSocket session ended");

        if is_last {
            let state = self.state.clone();
            let user_id = self.user_id;
            tokio::spawn(async move {
                presence::mark_offline(&state, user_id).await;
            });
        }
    }
}
