pub mod actor;
pub mod handler;
pub mod hub;
pub mod protocol;
pub mod wire;

use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific
/// client; the connection's writer task owns the socket sink, so all writes
/// to one socket are serialized through this channel.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;
