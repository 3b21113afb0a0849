mod common;

use blogcms::MessageResponse;
use common::{password_for, TestServer};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn health_check_and_unknown_routes() {
    let server = TestServer::spawn().await;

    let res = server.get("/check_health").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "alive");

    let res = server.get("/nowhere/").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_returns_user_without_password() {
    let server = TestServer::spawn().await;

    let res = server.register("alice").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert!(body["id"].as_i64().is_some());
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_rejects_duplicates() {
    let server = TestServer::spawn().await;
    assert_eq!(server.register("alice").await.status(), StatusCode::CREATED);

    let res = server.register("alice").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["errors"]["username"],
        json!(["A user with that username already exists."])
    );
    assert_eq!(
        body["errors"]["email"],
        json!(["A user with that email already exists."])
    );

    let res = server
        .post("/register/", None)
        .json(&json!({
            "username": "alice",
            "email": "other@example.com",
            "password": "whatever",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["errors"]["username"].is_array());
    assert!(body["errors"].get("email").is_none());

    let res = server
        .post("/register/", None)
        .json(&json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": "whatever",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"].get("username").is_none());

    // Nothing from the rejected attempts was stored.
    let res = server
        .post("/login/", None)
        .json(&json!({ "username": "alice2", "password": "whatever" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_reports_every_missing_field() {
    let server = TestServer::spawn().await;

    let res = server
        .post("/register/", None)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid input.");
    for field in ["username", "email", "password"] {
        assert!(body["errors"][field].is_array(), "missing error for {field}");
    }
}

#[tokio::test]
async fn login_checks_credentials() {
    let server = TestServer::spawn().await;
    server.register("alice").await;

    let res = server
        .post("/login/", None)
        .json(&json!({ "username": "alice", "password": password_for("alice") }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Login successful");
    assert!(!body["token"].as_str().unwrap().is_empty());

    for (username, password) in [("alice", "wrong"), ("nobody", "wrong"), ("", "")] {
        let res = server
            .post("/login/", None)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["detail"], "Invalid credentials");
        assert!(body.get("token").is_none());
    }
}

#[tokio::test]
async fn writes_require_a_valid_session() {
    let server = TestServer::spawn().await;
    let post = json!({ "title": "Hello", "content": "World" });

    let res = server.post("/posts/", None).json(&post).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .post("/posts/", Some("not-a-token"))
        .json(&post)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .post("/tags/", None)
        .json(&json!({ "name": "rust" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let server = TestServer::spawn().await;
    let (_, token) = server.user("alice").await;
    server.tag(&token, "before").await;

    let res = server.post("/logout/", Some(&token)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: MessageResponse = res.json().await.unwrap();
    assert_eq!(body.detail, "User logged out successfully");

    let res = server
        .post("/tags/", Some(&token))
        .json(&json!({ "name": "after" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Other sessions of the same user survive.
    let fresh = server.login("alice").await;
    server.tag(&fresh, "after").await;
}

#[tokio::test]
async fn logout_without_a_session_still_succeeds() {
    let server = TestServer::spawn().await;

    let res = server.post("/logout/", None).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
