//! Integration tests for the phone-code sign-in flow and token auth.

use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Helper: start the server on a random port and return (base_url, state).
async fn start_test_server() -> (String, webchat_server::state::AppState) {
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

    (format!("http://{}", addr), state)
}

#[tokio::test]
async fn test_send_code_requires_phone() {
    let (base_url, _state) = start_test_server().await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/auth/send-code", base_url))
        .json(&json!({"phone": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_code_flow_issues_single_use_token() {
    let (base_url, state) = start_test_server().await;
    let client = reqwest::Client::new();
    let phone = "+15551234567";

    let resp = client
        .post(format!("{}/api/auth/send-code", base_url))
        .json(&json!({"phone": phone}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // No SMS gateway in tests — read the issued code out of the store
    let code = state.codes.get(phone).expect("Code should be stored").code.clone();

    // Wrong code is rejected
    let resp = client
        .post(format!("{}/api/auth/verify-code", base_url))
        .json(&json!({"phone": phone, "code": "000000"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Right code yields a token
    let resp = client
        .post(format!("{}/api/auth/verify-code", base_url))
        .json(&json!({"phone": phone, "code": code}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    // The code is single-use
    let resp = client
        .post(format!("{}/api/auth/verify-code", base_url))
        .json(&json!({"phone": phone, "code": code}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // The token authenticates /api/auth/me
    let resp = client
        .get(format!("{}/api/auth/me", base_url))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let me: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(me["phone"], phone);
    assert!(me["userId"].as_str().is_some());
}

#[tokio::test]
async fn test_expired_code_rejected() {
    let (base_url, state) = start_test_server().await;

    state.codes.insert(
        "+15550000000".to_string(),
        webchat_server::state::CodeEntry {
            code: "123456".to_string(),
            expires_at: chrono::Utc::now() - chrono::Duration::seconds(1),
        },
    );

    let resp = reqwest::Client::new()
        .post(format!("{}/api/auth/verify-code", base_url))
        .json(&json!({"phone": "+15550000000", "code": "123456"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_me_requires_token() {
    let (base_url, _state) = start_test_server().await;

    let resp = reqwest::Client::new()
        .get(format!("{}/api/auth/me", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = reqwest::Client::new()
        .get(format!("{}/api/auth/me", base_url))
        .header("Authorization", "Bearer not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
