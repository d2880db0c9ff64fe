//! Session coordinator: the sole authority over the presence table and the
//! only place that turns connection lifecycle events into persistence and
//! broadcast.
//!
//! Intra-connection ordering comes from the transport: each connection's
//! actor dispatches its events one at a time, awaiting completion before
//! reading the next frame. Events from different connections interleave
//! freely at await points, so roster broadcasts are eventually consistent
//! rather than linearizable.

use chrono::Utc;

use crate::chat::presence::{self, PresenceEntry};
use crate::chat::store::{self, ChatMessage};
use crate::state::AppState;
use crate::users::store as users_store;
use crate::ws::broadcast::{broadcast_to_all, send_to_connection};
use crate::ws::protocol::ServerEvent;

type SessionResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Fallback display name when the sender has no usable identity record.
const UNKNOWN_SENDER: &str = "Unknown";

/// Bind a connection to a user identity.
///
/// Registers (or overwrites) the presence entry, upserts the identity
/// record, replays recent history to the joining connection only, and
/// broadcasts the new roster to everyone. Calling join again on an
/// already-joined connection repeats all of that — a re-join, not an error.
pub async fn join(
    state: &AppState,
    connection_id: &str,
    user_id: &str,
    phone: &str,
) -> SessionResult {
    presence::register(
        &state.presence,
        connection_id,
        PresenceEntry {
            user_id: user_id.to_string(),
            phone: phone.to_string(),
        },
    );

    let db = state.db.clone();
    {
        let user_id = user_id.to_string();
        let phone = phone.to_string();
        let connection_id = connection_id.to_string();
        tokio::task::spawn_blocking(move || {
            users_store::upsert_on_join(&db, &user_id, &phone, &connection_id)
        })
        .await??;
    }

    // Replay history to the joining connection only
    let db = state.db.clone();
    let history = tokio::task::spawn_blocking(move || store::recent_history(&db)).await??;
    send_to_connection(
        &state.connections,
        connection_id,
        &ServerEvent::ChatHistory { messages: history },
    );

    let users = presence::roster(&state.presence);
    broadcast_to_all(&state.connections, &ServerEvent::UsersUpdate { users });

    tracing::debug!(connection_id = %connection_id, user_id = %user_id, "Connection joined");

    Ok(())
}

/// Persist a message and broadcast the stored record to all connections.
///
/// Lenient on identity: a send from a connection that never joined, or
/// naming a sender with no identity record, is still accepted — the
/// display name degrades rather than the message being rejected.
pub async fn send_message(
    state: &AppState,
    connection_id: &str,
    message_id: String,
    text: String,
    sender: String,
    sender_name: Option<String>,
) -> SessionResult {
    if !state.presence.contains_key(connection_id) {
        tracing::debug!(connection_id = %connection_id, "send_message from unjoined connection");
    }

    let db = state.db.clone();
    let sender_id = sender.clone();
    let user =
        tokio::task::spawn_blocking(move || users_store::get_by_user_id(&db, &sender_id)).await??;

    // Identity record wins over the client-supplied name; both may be absent
    let resolved_name = user
        .as_ref()
        .map(|u| u.display_name.clone())
        .filter(|n| !n.is_empty())
        .or(sender_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
    let avatar_url = user.and_then(|u| u.avatar_url);

    let message = ChatMessage {
        id: message_id,
        text,
        sender,
        sender_name: resolved_name,
        sender_avatar_url: avatar_url,
        timestamp: Utc::now(),
    };

    let db = state.db.clone();
    let to_store = message.clone();
    tokio::task::spawn_blocking(move || store::append_message(&db, &to_store)).await??;

    // All clients, the sender included, render the stored record
    broadcast_to_all(&state.connections, &ServerEvent::ReceiveMessage { message });

    Ok(())
}

/// Tear down a connection's presence.
///
/// No-op when the connection never joined or was already disconnected;
/// otherwise refreshes the identity's last-active timestamp, drops the
/// presence entry, and broadcasts the shrunken roster.
pub async fn disconnect(state: &AppState, connection_id: &str) -> SessionResult {
    let Some(entry) = presence::remove(&state.presence, connection_id) else {
        return Ok(());
    };

    let db = state.db.clone();
    {
        let connection_id = connection_id.to_string();
        tokio::task::spawn_blocking(move || {
            users_store::touch_last_active_by_connection(&db, &connection_id)
        })
        .await??;
    }

    let users = presence::roster(&state.presence);
    broadcast_to_all(&state.connections, &ServerEvent::UsersUpdate { users });

    tracing::debug!(connection_id = %connection_id, user_id = %entry.user_id, "Connection left");

    Ok(())
}
