//! Integration tests for profile setup/fetch, avatar serving, and the
//! online-users presence snapshot.

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// Helper: start the server on a random port and return (base_url, addr, state).
async fn start_test_server() -> (String, SocketAddr, webchat_server::state::AppState) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = webchat_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = webchat_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = webchat_server::state::AppState {
        db,
        codes: Arc::new(dashmap::DashMap::new()),
        jwt_secret,
        connections: webchat_server::ws::new_connection_registry(),
        presence: webchat_server::chat::presence::new_presence_table(),
        data_dir: data_dir.clone(),
        cors_origins: Vec::new(),
    };

    let app = webchat_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr, state)
}

fn avatar_form(username: &str, user_id: &str, bytes: Vec<u8>) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("username", username.to_string())
        .text("userId", user_id.to_string())
        .part(
            "avatar",
            reqwest::multipart::Part::bytes(bytes).file_name("avatar.png"),
        )
}

#[tokio::test]
async fn test_profile_setup_and_fetch() {
    let (base_url, _addr, _state) = start_test_server().await;
    let client = reqwest::Client::new();
    let avatar_bytes = vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

    let resp = client
        .post(format!("{}/api/users/setup", base_url))
        .multipart(avatar_form("Alice", "u1", avatar_bytes.clone()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    let avatar_url = body["avatarUrl"].as_str().unwrap().to_string();
    assert!(avatar_url.starts_with("/uploads/"));
    assert!(avatar_url.ends_with(".png"));

    // Profile fetch returns the stored name and avatar URL
    let resp = client
        .get(format!("{}/api/user/u1", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let profile: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(profile["username"], "Alice");
    assert_eq!(profile["avatarUrl"], avatar_url);

    // The avatar is served back at its URL
    let resp = client
        .get(format!("{}{}", base_url, avatar_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().to_vec(), avatar_bytes);
}

#[tokio::test]
async fn test_profile_setup_overwrites_existing() {
    let (base_url, _addr, _state) = start_test_server().await;
    let client = reqwest::Client::new();

    for name in ["First", "Second"] {
        let resp = client
            .post(format!("{}/api/users/setup", base_url))
            .multipart(avatar_form(name, "u1", vec![1, 2, 3]))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let profile: serde_json::Value = client
        .get(format!("{}/api/user/u1", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["username"], "Second");
}

#[tokio::test]
async fn test_profile_setup_missing_fields() {
    let (base_url, _addr, _state) = start_test_server().await;

    // No avatar part
    let form = reqwest::multipart::Form::new()
        .text("username", "Alice")
        .text("userId", "u1");
    let resp = reqwest::Client::new()
        .post(format!("{}/api/users/setup", base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_unknown_profile_is_404() {
    let (base_url, _addr, _state) = start_test_server().await;

    let resp = reqwest::Client::new()
        .get(format!("{}/api/user/nobody", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_online_users_snapshot_tracks_joins() {
    let (base_url, addr, _state) = start_test_server().await;
    let client = reqwest::Client::new();

    let snapshot: serde_json::Value = client
        .get(format!("{}/api/users/online", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["users"].as_array().unwrap().len(), 0);

    // Join over WebSocket, then the snapshot shows the identity
    let (ws_stream, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("Failed to connect");
    let (mut write, mut read) = ws_stream.split();
    write
        .send(Message::Text(
            json!({"type": "join", "userId": "u1", "phone": "+15550001"})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

    // Wait for the roster broadcast so the join has completed
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Timed out waiting for join to complete")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            let event: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            if event["type"] == "users_update" {
                break;
            }
        }
    }

    let snapshot: serde_json::Value = client
        .get(format!("{}/api/users/online", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let users = snapshot["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["userId"], "u1");
    assert_eq!(users[0]["phone"], "+15550001");
}
