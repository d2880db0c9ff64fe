//! JSON wire protocol and per-event dispatch.
//!
//! Frames are text, `type`-tagged. Client events route to the session
//! coordinator; this is also the catch-all boundary — a failed event is
//! logged and the connection keeps running, it never takes the broadcast
//! loop or other connections down with it.

use serde::{Deserialize, Serialize};

use crate::chat::session;
use crate::chat::store::ChatMessage;
use crate::state::AppState;
use crate::ws::broadcast::send_to_connection;

/// Events a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    Join { user_id: String, phone: String },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        id: String,
        text: String,
        /// Sender's stable user id
        sender: String,
        #[serde(default)]
        sender_name: Option<String>,
    },
}

/// Events the server emits.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Recent-history replay, unicast to the joining connection
    ChatHistory { messages: Vec<ChatMessage> },
    /// Roster of present phones, broadcast to all
    UsersUpdate { users: Vec<String> },
    /// A stored message, broadcast to all
    ReceiveMessage { message: ChatMessage },
    /// Validation failure, unicast to the offending connection
    Error { message: String },
}

/// Handle one incoming text frame from a connection.
pub async fn handle_text_message(text: &str, state: &AppState, connection_id: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                connection_id = %connection_id,
                error = %e,
                "Failed to decode client event"
            );
            send_error(state, connection_id, "Invalid event payload");
            return;
        }
    };

    match event {
        ClientEvent::Join { user_id, phone } => {
            if user_id.trim().is_empty() || phone.trim().is_empty() {
                send_error(state, connection_id, "join requires userId and phone");
                return;
            }
            if let Err(e) = session::join(state, connection_id, &user_id, &phone).await {
                tracing::error!(
                    connection_id = %connection_id,
                    user_id = %user_id,
                    error = %e,
                    "join failed"
                );
            }
        }
        ClientEvent::SendMessage {
            id,
            text,
            sender,
            sender_name,
        } => {
            if id.is_empty() || text.is_empty() || sender.is_empty() {
                send_error(state, connection_id, "send_message requires id, text, and sender");
                return;
            }
            if let Err(e) =
                session::send_message(state, connection_id, id, text, sender, sender_name).await
            {
                tracing::error!(
                    connection_id = %connection_id,
                    error = %e,
                    "send_message failed"
                );
            }
        }
    }
}

/// Unicast a validation error to the offending connection.
fn send_error(state: &AppState, connection_id: &str, message: &str) {
    send_to_connection(
        &state.connections,
        connection_id,
        &ServerEvent::Error {
            message: message.to_string(),
        },
    );
}
