//! Presence notifier: persists and broadcasts the online/offline transitions
//! reported by the registry.
//!
//! Presence is derived purely from connection existence; the lifecycle only
//! calls in here when register/unregister reported a transition.

use crate::db::store;
use crate::state::AppState;
use crate::ws::hub::EXCLUDE_NONE;
use crate::ws::wire::ServerEvent;

/// First connection registered: persist "online", then tell everyone except
/// the subject (a user never receives notice of their own arrival).
pub async fn mark_online(state: &AppState, user_id: i64) {
    persist_status(state, user_id, "online").await;
    state
        .hub
        .broadcast(&ServerEvent::UserOnline { user_id }, user_id);
}

/// Last connection gone: persist "offline", then tell everyone with no
/// exclusion. Any of the user's still-connecting sessions harmlessly learn
/// of the departure too, since the envelope only carries the subject id.
pub async fn mark_offline(state: &AppState, user_id: i64) {
    persist_status(state, user_id, "offline").await;
    state
        .hub
        .broadcast(&ServerEvent::UserOffline { user_id }, EXCLUDE_NONE);
}

/// Durable copy of the derived presence. Failures are logged and do not
/// suppress the broadcast: in-memory presence reflects reality even if the
/// durable copy lags.
async fn persist_status(state: &AppState, user_id: i64, status: &'static str) {
    let db = state.db.clone();
    let result = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
        store::update_user_status(&conn, user_id, status).map_err(|e| e.to_string())
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(user_id, status, error = %e, "Failed to persist user status")
        }
        Err(e) => tracing::warn!(user_id, status, error = %e, "Status persistence task failed"),
    }
}
