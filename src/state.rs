use sqlx::SqlitePool;
use std::sync::Arc;

use crate::realtime::dispatcher::Dispatcher;
use crate::realtime::registry::RoomRegistry;

/// Shared application state. The room registry and dispatcher are injected
/// here rather than living in module-level statics so tests can build
/// isolated instances and alternative registries can be swapped in.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub rooms: Arc<RoomRegistry>,
    pub dispatcher: Arc<Dispatcher>,
}
