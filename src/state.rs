use std::sync::Arc;

use crate::db::DbPool;
use crate::ws::hub::Hub;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Connection registry: the source of truth for presence and fan-out
    pub hub: Arc<Hub>,
}
