//! Wire-level JSON envelopes exchanged over the WebSocket.
//!
//! Inbound frames are parsed in two phases: first into [`RawEnvelope`]
//! (tag + untyped body), then, once the tag is matched, into the specific
//! payload struct. Unknown tags are discarded at phase one without touching
//! the body.

use serde::{Deserialize, Serialize};

/// Phase-one shape of every client frame: the tag plus whatever else came.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub body: serde_json::Value,
}

/// `private_message` body
#[derive(Debug, Deserialize)]
pub struct PrivateMessagePayload {
    pub recipient_id: i64,
    pub content: String,
}

/// `typing_start` / `typing_stop` body
#[derive(Debug, Deserialize)]
pub struct TypingPayload {
    pub recipient_id: i64,
}

/// `message_read` body; sender_id names the user whose messages were read.
#[derive(Debug, Deserialize)]
pub struct MessageReadPayload {
    pub sender_id: i64,
}

/// Everything the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "incoming_message")]
    IncomingMessage {
        sender_id: i64,
        sender_username: String,
        content: String,
    },

    #[serde(rename = "typing_start")]
    TypingStart { recipient_id: i64, sender_id: i64 },

    #[serde(rename = "typing_stop")]
    TypingStop { recipient_id: i64, sender_id: i64 },

    #[serde(rename = "read_receipt_update")]
    ReadReceiptUpdate { reader_id: i64, sender_id: i64 },

    #[serde(rename = "user_online")]
    UserOnline {
        #[serde(rename = "userId")]
        user_id: i64,
    },

    #[serde(rename = "user_offline")]
    UserOffline {
        #[serde(rename = "userId")]
        user_id: i64,
    },
}
