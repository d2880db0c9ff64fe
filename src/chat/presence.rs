//! In-memory presence table.
//!
//! Maps live connection ids to the identity bound by `join`. Authoritative
//! only for the current process lifetime — a restart drops all presence
//! until clients rejoin. The session coordinator is the single writer;
//! transport handlers and REST endpoints only read snapshots.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::ws::ConnectionId;

/// Identity bound to a live connection by `join`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: String,
    pub phone: String,
}

/// Presence table: connection id -> joined identity.
pub type PresenceTable = Arc<DashMap<ConnectionId, PresenceEntry>>;

/// Create a new empty presence table.
pub fn new_presence_table() -> PresenceTable {
    Arc::new(DashMap::new())
}

/// Register (or overwrite, on re-join) the entry for a connection.
/// Session coordinator only.
pub(in crate::chat) fn register(table: &PresenceTable, connection_id: &str, entry: PresenceEntry) {
    table.insert(connection_id.to_string(), entry);
}

/// Remove the entry for a closing connection, returning it if one existed.
/// Session coordinator only.
pub(in crate::chat) fn remove(
    table: &PresenceTable,
    connection_id: &str,
) -> Option<PresenceEntry> {
    table.remove(connection_id).map(|(_, entry)| entry)
}

/// Roster view: the distinct phones with an active presence entry.
/// Sorted for deterministic payloads; recipients treat order as irrelevant.
pub fn roster(table: &PresenceTable) -> Vec<String> {
    let mut phones: Vec<String> = table.iter().map(|e| e.value().phone.clone()).collect();
    phones.sort();
    phones.dedup();
    phones
}

/// Full snapshot of the presence entries (REST online-users endpoint).
pub fn snapshot(table: &PresenceTable) -> Vec<PresenceEntry> {
    table.iter().map(|e| e.value().clone()).collect()
}
