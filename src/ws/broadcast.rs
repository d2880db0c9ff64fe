//! Fire-and-forget event delivery.
//!
//! Both delivery modes are best-effort by contract: no acknowledgement, no
//! retry, and a send to a connection that is already closing is silently
//! dropped. For a single recipient, events arrive in the order they were
//! enqueued (one mpsc channel per connection); ordering across recipients
//! is not guaranteed.

use axum::extract::ws::Message;

use super::protocol::ServerEvent;
use super::ConnectionRegistry;

/// Broadcast an event to all currently open connections.
pub fn broadcast_to_all(registry: &ConnectionRegistry, event: &ServerEvent) {
    let payload = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize broadcast event");
            return;
        }
    };

    for entry in registry.iter() {
        let _ = entry.value().send(Message::Text(payload.clone().into()));
    }
}

/// Send an event to one connection (history replay at join time).
pub fn send_to_connection(
    registry: &ConnectionRegistry,
    connection_id: &str,
    event: &ServerEvent,
) {
    let payload = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize unicast event");
            return;
        }
    };

    if let Some(sender) = registry.get(connection_id) {
        let _ = sender.send(Message::Text(payload.into()));
    }
}
