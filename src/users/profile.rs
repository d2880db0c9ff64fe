//! REST endpoints for user profiles and the live-presence snapshot.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::chat::presence::{self, PresenceEntry};
use crate::state::AppState;
use crate::users::{avatar, store};

/// Maximum accepted avatar size (bytes).
const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

// --- Request/Response types ---

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupProfileResponse {
    pub success: bool,
    pub avatar_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OnlineUsersResponse {
    pub users: Vec<PresenceEntry>,
}

// --- Handlers ---

/// POST /api/users/setup
/// Multipart profile setup: `username` and `userId` text fields plus an
/// `avatar` image. Stores the avatar and upserts the identity.
pub async fn setup_profile(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SetupProfileResponse>, (StatusCode, String)> {
    let mut username: Option<String> = None;
    let mut user_id: Option<String> = None;
    let mut avatar_file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid multipart payload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "username" => {
                username = Some(field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Invalid username field: {}", e))
                })?);
            }
            "userId" => {
                user_id = Some(field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Invalid userId field: {}", e))
                })?);
            }
            "avatar" => {
                let file_name = field.file_name().unwrap_or("avatar").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Invalid avatar field: {}", e))
                })?;
                avatar_file = Some((file_name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (Some(username), Some(user_id), Some((file_name, bytes))) =
        (username, user_id, avatar_file)
    else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Missing required fields: username, userId, or avatar".to_string(),
        ));
    };

    if username.trim().is_empty() || user_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Missing required fields: username, userId, or avatar".to_string(),
        ));
    }

    if bytes.len() > MAX_AVATAR_BYTES {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            "Avatar too large (max 5MB)".to_string(),
        ));
    }

    let db = state.db.clone();
    let data_dir = state.data_dir.clone();

    let (user_id, avatar_url) = tokio::task::spawn_blocking(move || {
        let url = avatar::store_avatar(&data_dir, &file_name, &bytes)?;
        store::set_profile(&db, &user_id, &username, &url)?;
        Ok::<_, Box<dyn std::error::Error + Send + Sync>>((user_id, url))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))?
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Profile setup: {}", e)))?;

    tracing::info!(user_id = %user_id, "Profile updated");

    Ok(Json(SetupProfileResponse {
        success: true,
        avatar_url,
    }))
}

/// GET /api/user/{id}
/// Public profile lookup: display name and avatar URL only.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>, StatusCode> {
    let db = state.db.clone();

    let user = tokio::task::spawn_blocking(move || store::get_by_user_id(&db, &id))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ProfileResponse {
        username: user.display_name,
        avatar_url: user.avatar_url,
    }))
}

/// GET /api/users/online
/// Snapshot of the presence table: who is connected and joined right now.
pub async fn online_users(State(state): State<AppState>) -> Json<OnlineUsersResponse> {
    Json(OnlineUsersResponse {
        users: presence::snapshot(&state.presence),
    })
}
