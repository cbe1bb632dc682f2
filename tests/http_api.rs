use std::{path::Path, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use directline::{
    app,
    config::RelayConfig,
    db,
    gateway::{Gateway, SqliteGateway},
    AppState, Relay,
};
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use time::OffsetDateTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

async fn seeded_pool() -> SqlitePool {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::bootstrap(&db_pool).await.unwrap();
    db::seed_users(&db_pool, &db::DEMO_USERS, 4).await.unwrap();
    db_pool
}

async fn test_app(static_dir: &Path) -> (SqlitePool, Router) {
    let db_pool = seeded_pool().await;
    let (relay, fan_out) = Relay::new(Arc::new(SqliteGateway::new(db_pool.clone())), RelayConfig::default());
    tokio::spawn(fan_out.run());
    let app = app(AppState { db_pool: db_pool.clone(), relay }, static_dir, 5);
    (db_pool, app)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn login(username: &str, password: &str) -> Request<Body> {
    Request::post("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"username": username, "password": password}).to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn login_checks_the_password() {
    let dir = tempfile::tempdir().unwrap();
    let (_db_pool, app) = test_app(dir.path()).await;

    let (status, body) = call(&app, login("bob", "password123")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"id": 2, "username": "bob"}));

    let (status, _) = call(&app, login("bob", "hunter2")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, login("mallory", "password123")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rejects_garbage_bodies() {
    let dir = tempfile::tempdir().unwrap();
    let (_db_pool, app) = test_app(dir.path()).await;

    let request = Request::post("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = call(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn users_are_sorted_by_latest_conversation_then_name() {
    let dir = tempfile::tempdir().unwrap();
    let (db_pool, app) = test_app(dir.path()).await;
    let gateway = SqliteGateway::new(db_pool.clone());
    let now = OffsetDateTime::now_utc();

    // alice=1 bob=2 charlie=3 diana=4
    gateway.save_message(1, 4, "hey diana", now).await.unwrap();
    gateway.save_message(3, 1, "hey alice", now).await.unwrap();
    gateway.set_online(2, true).await.unwrap();

    let (status, body) = call(&app, get("/api/users?current_user_id=1")).await;
    assert_eq!(status, StatusCode::OK);
    let users: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(users, json!([
        {"id": 3, "username": "charlie", "online": false},
        {"id": 4, "username": "diana", "online": false},
        {"id": 2, "username": "bob", "online": true},
    ]));
}

#[tokio::test]
async fn conversation_is_returned_oldest_first() {
    let dir = tempfile::tempdir().unwrap();
    let (db_pool, app) = test_app(dir.path()).await;
    let gateway = SqliteGateway::new(db_pool);
    let now = OffsetDateTime::now_utc();

    gateway.save_message(1, 2, "first", now).await.unwrap();
    gateway.save_message(3, 1, "elsewhere", now).await.unwrap();
    gateway.save_message(2, 1, "second", now).await.unwrap();

    let (status, body) = call(&app, get("/api/messages?current_user_id=1&other_user_id=2")).await;
    assert_eq!(status, StatusCode::OK);
    let messages: Value = serde_json::from_slice(&body).unwrap();
    let contents: Vec<&str> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["first", "second"]);
    assert_eq!(messages[1]["sender_id"], 2);
    assert!(messages[0]["timestamp"].is_string());

    let (status, _) = call(&app, get("/api/messages?current_user_id=1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_paths_fall_back_to_static_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>chat</h1>").unwrap();
    let (_db_pool, app) = test_app(dir.path()).await;

    let (status, body) = call(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<h1>chat</h1>");

    let (status, _) = call(&app, get("/missing.js")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn handshake(addr: std::net::SocketAddr, query: &str) -> String {
    handshake_with_cookie(addr, query, None).await
}

async fn handshake_with_cookie(addr: std::net::SocketAddr, query: &str, cookie: Option<&str>) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let cookie = cookie.map(|cookie| format!("Cookie: {cookie}\r\n")).unwrap_or_default();
    let request = format!(
        "GET /ws{query} HTTP/1.1\r\n\
         Host: {addr}\r\n\
         {cookie}\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut buf = vec![0; 1024];
    let n = stream.read(&mut buf).await.unwrap();
    let response = String::from_utf8_lossy(&buf[..n]).into_owned();
    response.lines().next().unwrap_or_default().to_owned()
}

#[tokio::test]
async fn handshake_requires_a_known_non_zero_identity() {
    let dir = tempfile::tempdir().unwrap();
    let (_db_pool, app) = test_app(dir.path()).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    assert!(handshake(addr, "?user_id=0").await.contains("400"));
    assert!(handshake(addr, "").await.contains("400"));
    assert!(handshake(addr, "?user_id=99").await.contains("404"));
    assert!(handshake(addr, "?user_id=1").await.contains("101"));
}

#[tokio::test]
async fn handshake_falls_back_to_the_login_session() {
    let dir = tempfile::tempdir().unwrap();
    let (_db_pool, app) = test_app(dir.path()).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = app.clone();
    tokio::spawn(async move { axum::serve(listener, server).await });

    let response = app.clone().oneshot(login("alice", "password123")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_owned();

    assert!(handshake_with_cookie(addr, "", Some(&cookie)).await.contains("101"));

    let logout = Request::post("/api/logout")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app, logout).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(handshake_with_cookie(addr, "", Some(&cookie)).await.contains("400"));
}
