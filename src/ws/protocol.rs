//! Message router: classifies each inbound frame by tag and dispatches it to
//! persistence and/or other live connections.
//!
//! Nothing here is fatal to the connection. Malformed frames, validation
//! failures, persistence failures, and delivery failures are all logged and
//! discarded; only a transport-level failure ends the receive loop, and that
//! is the actor's concern.

use axum::extract::ws::Message;

use crate::db::store;
use crate::state::AppState;
use crate::ws::wire::{
    MessageReadPayload, PrivateMessagePayload, RawEnvelope, ServerEvent, TypingPayload,
};

/// Handle one inbound text frame: phase-one decode into {tag, body}, then
/// dispatch by tag. Unknown tags are discarded without touching the body.
pub async fn handle_text_frame(text: &str, state: &AppState, user_id: i64, username: &str) {
    let frame: RawEnvelope = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Discarding undecodable frame");
            return;
        }
    };

    match frame.kind.as_str() {
        "private_message" => handle_private_message(frame.body, state, user_id, username).await,
        "typing_start" => handle_typing(frame.body, state, user_id, true),
        "typing_stop" => handle_typing(frame.body, state, user_id, false),
        "message_read" => handle_message_read(frame.body, state, user_id),
        other => {
            tracing::debug!(user_id, tag = other, "Discarding frame with unrecognized tag");
        }
    }
}

/// `private_message`: validate, persist, then deliver to every live
/// connection of the recipient. Persistence is a precondition for delivery;
/// an offline recipient leaves the message persisted-only.
async fn handle_private_message(
    body: serde_json::Value,
    state: &AppState,
    user_id: i64,
    username: &str,
) {
    let payload: PrivateMessagePayload = match serde_json::from_value(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Discarding malformed private_message");
            return;
        }
    };

    if payload.recipient_id <= 0 || payload.content.is_empty() {
        tracing::warn!(
            user_id,
            recipient_id = payload.recipient_id,
            "Discarding invalid private_message"
        );
        return;
    }

    let db = state.db.clone();
    let recipient_id = payload.recipient_id;
    let content = payload.content.clone();
    let persisted = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
        store::create_message(&conn, user_id, recipient_id, &content).map_err(|e| e.to_string())
    })
    .await;

    match persisted {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            tracing::warn!(user_id, error = %e, "Failed to persist private_message; not delivering");
            return;
        }
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Persistence task panicked; not delivering");
            return;
        }
    }

    let event = ServerEvent::IncomingMessage {
        sender_id: user_id,
        sender_username: username.to_string(),
        content: payload.content,
    };
    deliver_to_user(state, payload.recipient_id, &event);
}

/// `typing_start` / `typing_stop`: no persistence, stamp this connection's
/// identity as sender, best-effort forward. Silently dropped if the
/// recipient is offline.
fn handle_typing(body: serde_json::Value, state: &AppState, user_id: i64, starting: bool) {
    let payload: TypingPayload = match serde_json::from_value(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Discarding malformed typing indicator");
            return;
        }
    };

    let event = if starting {
        ServerEvent::TypingStart {
            recipient_id: payload.recipient_id,
            sender_id: user_id,
        }
    } else {
        ServerEvent::TypingStop {
            recipient_id: payload.recipient_id,
            sender_id: user_id,
        }
    };
    deliver_to_user(state, payload.recipient_id, &event);
}

/// `message_read`: construct a receipt addressed back to the original
/// sender named in the payload. Silently dropped if that user is offline.
fn handle_message_read(body: serde_json::Value, state: &AppState, user_id: i64) {
    let payload: MessageReadPayload = match serde_json::from_value(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Discarding malformed message_read");
            return;
        }
    };

    let event = ServerEvent::ReadReceiptUpdate {
        reader_id: user_id,
        sender_id: payload.sender_id,
    };
    deliver_to_user(state, payload.sender_id, &event);
}

/// Write an event to every current connection of one user, independently:
/// a failed send to one connection never affects its siblings, and the
/// broken connection's own lifecycle performs the cleanup.
fn deliver_to_user(state: &AppState, recipient_id: i64, event: &ServerEvent) {
    let connections = state.hub.connections_of(recipient_id);
    if connections.is_empty() {
        return;
    }

    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize outbound event");
            return;
        }
    };
    let msg = Message::Text(json.into());

    for sender in &connections {
        if sender.send(msg.clone()).is_err() {
            tracing::debug!(recipient_id, "Delivery failed; recipient connection is closing");
        }
    }
}
