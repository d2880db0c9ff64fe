use dashmap::DashMap;
use std::sync::Arc;

use crate::chat::presence::PresenceTable;
use crate::db::DbPool;
use crate::ws::ConnectionRegistry;

/// One-time phone verification code with expiry
#[derive(Debug, Clone)]
pub struct CodeEntry {
    pub code: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// In-memory one-time code store (DashMap for concurrent access)
    pub codes: Arc<DashMap<String, CodeEntry>>,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Active WebSocket connections by connection id
    pub connections: ConnectionRegistry,
    /// In-memory presence table: connection id -> joined identity.
    /// Mutated only by the session coordinator.
    pub presence: PresenceTable,
    /// Data directory (DB, signing key, uploaded avatars)
    pub data_dir: String,
    /// Allowed CORS origins (empty = allow any)
    pub cors_origins: Vec<String>,
}
