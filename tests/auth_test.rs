//! Integration tests for registration, login, and the online/offline
//! user listings.

use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use pigeon_server::state::AppState;
use pigeon_server::ws::hub::Hub;

struct TestServer {
    base_url: String,
    addr: SocketAddr,
    _tmp: tempfile::TempDir,
}

/// Start the server on a random port with a throwaway data directory.
async fn start_test_server() -> TestServer {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp.path().to_str().unwrap().to_string();

    let db = pigeon_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = pigeon_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = AppState {
        db,
        jwt_secret,
        hub: Arc::new(Hub::new()),
    };

    let app = pigeon_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        addr,
        _tmp: tmp,
    }
}

#[tokio::test]
async fn test_register_and_login() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/users", server.base_url))
        .json(&json!({"username": "alice", "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["username"], "alice");
    let user_id = body["user_id"].as_i64().unwrap();
    assert!(user_id > 0);

    let resp = client
        .post(format!("{}/api/login", server.base_url))
        .json(&json!({"username": "alice", "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["user_id"], user_id);
    assert!(!body["access_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_duplicate_username_conflict() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/users", server.base_url))
        .json(&json!({"username": "alice", "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{}/api/users", server.base_url))
        .json(&json!({"username": "alice", "password": "other"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn test_register_empty_fields_rejected() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/users", server.base_url))
        .json(&json!({"username": "", "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/api/users", server.base_url))
        .json(&json!({"username": "alice", "password": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/users", server.base_url))
        .json(&json!({"username": "alice", "password": "hunter2"}))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/api/login", server.base_url))
        .json(&json!({"username": "alice", "password": "wrong"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("{}/api/login", server.base_url))
        .json(&json!({"username": "nobody", "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_user_listings_require_auth() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/users/online", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{}/api/users/offline", server.base_url))
        .header("Authorization", "Bearer garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

/// Register + login helper. Returns (user_id, access_token).
async fn register_and_login(base_url: &str, username: &str) -> (i64, String) {
    let client = reqwest::Client::new();
    client
        .post(format!("{}/api/users", base_url))
        .json(&json!({"username": username, "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    let resp = client
        .post(format!("{}/api/login", base_url))
        .json(&json!({"username": username, "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    (
        body["user_id"].as_i64().unwrap(),
        body["access_token"].as_str().unwrap().to_string(),
    )
}

async fn list_usernames(base_url: &str, which: &str, token: &str) -> Vec<String> {
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{}/api/users/{}", base_url, which))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    body.as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_listings_track_persisted_presence() {
    let server = start_test_server().await;
    let (_alice_id, alice_token) = register_and_login(&server.base_url, "alice").await;
    let (_bob_id, bob_token) = register_and_login(&server.base_url, "bob").await;

    // Nobody has connected yet, so both are offline.
    let offline = list_usernames(&server.base_url, "offline", &bob_token).await;
    assert!(offline.contains(&"alice".to_string()));
    assert!(offline.contains(&"bob".to_string()));

    // Alice connects over WebSocket; her durable status flips to online.
    let ws_url = format!("ws://{}/ws?token={}", server.addr, alice_token);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let online = list_usernames(&server.base_url, "online", &bob_token).await;
    assert_eq!(online, vec!["alice".to_string()]);

    // Alice disconnects; the offline transition is persisted.
    drop(ws_stream);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let online = list_usernames(&server.base_url, "online", &bob_token).await;
    assert!(online.is_empty());
    let offline = list_usernames(&server.base_url, "offline", &bob_token).await;
    assert!(offline.contains(&"alice".to_string()));
}
