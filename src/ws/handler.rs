use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;

use crate::auth::jwt;
use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for WebSocket connection.
/// Auth is via query param ?token=JWT, with Authorization: Bearer as fallback.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// WebSocket close code 1008 (policy violation), sent for any auth failure
/// before the connection is ever registered.
const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// GET /ws?token=JWT
/// WebSocket upgrade endpoint. Authenticates before registration.
/// On auth failure, upgrades then immediately closes with a policy-violation
/// close frame. On success, spawns the session actor for the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = params.token.or_else(|| bearer_token(&headers));

    let Some(token) = token else {
        tracing::warn!("WebSocket connection without token");
        return reject(ws, "missing token");
    };

    match jwt::validate_access_token(&state.jwt_secret, &token) {
        Ok(claims) => {
            tracing::info!(
                user_id = claims.sub,
                username = %claims.username,
                "WebSocket connection authenticated"
            );
            ws.on_upgrade(move |socket| {
                actor::run_connection(socket, state, claims.sub, claims.username)
            })
        }
        Err(err) => {
            let reason = match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => "token expired",
                _ => "token invalid",
            };
            tracing::warn!(reason, "WebSocket auth failed");
            reject(ws, reason)
        }
    }
}

/// Extract a token from an Authorization: Bearer header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Upgrade the connection, then immediately close it with a policy-violation
/// frame carrying the given reason.
fn reject(ws: WebSocketUpgrade, reason: &'static str) -> Response {
    ws.on_upgrade(move |mut socket| async move {
        let close_frame = CloseFrame {
            code: CLOSE_POLICY_VIOLATION,
            reason: reason.into(),
        };
        let _ = socket.send(Message::Close(Some(close_frame))).await;
    })
}
