#![allow(dead_code)]

use blogcms::{init_db, make_router, serve, AppConfig, LoginResponse, UserResponse};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(AppConfig::in_memory("test-secret")).await
    }

    /// Same router as production, on an ephemeral port and a fresh in-memory
    /// database.
    pub async fn spawn_with(config: AppConfig) -> Self {
        let pool = init_db(&config).await.expect("failed to init database");
        let app = make_router(pool, config);
        let listener =
            std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.post(self.url(path)), token)
    }

    pub fn put(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.put(self.url(path)), token)
    }

    pub fn patch(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.patch(self.url(path)), token)
    }

    pub fn delete(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.delete(self.url(path)), token)
    }

    pub async fn register(&self, username: &str) -> Response {
        self.post("/register/", None)
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": password_for(username),
            }))
            .send()
            .await
            .unwrap()
    }

    pub async fn login(&self, username: &str) -> String {
        let res = self
            .post("/login/", None)
            .json(&json!({ "username": username, "password": password_for(username) }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: LoginResponse = res.json().await.unwrap();
        body.token
    }

    /// Registers `username` and returns `(user id, session token)`.
    pub async fn user(&self, username: &str) -> (i64, String) {
        let res = self.register(username).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let user: UserResponse = res.json().await.unwrap();
        assert_eq!(user.username, username);
        (user.id, self.login(username).await)
    }

    pub async fn category(&self, token: &str, name: &str) -> i64 {
        self.named("/categories/", token, name).await
    }

    pub async fn tag(&self, token: &str, name: &str) -> i64 {
        self.named("/tags/", token, name).await
    }

    async fn named(&self, path: &str, token: &str, name: &str) -> i64 {
        let res = self
            .post(path, Some(token))
            .json(&json!({ "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn create_post(&self, token: &str, post: Value) -> Value {
        let res = self
            .post("/posts/", Some(token))
            .json(&post)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json().await.unwrap()
    }

    pub async fn get_json(&self, path: &str) -> Value {
        let res = self.get(path).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "GET {path}");
        res.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn with_token(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.header("Authorization", format!("Token {token}")),
        None => builder,
    }
}

pub fn password_for(username: &str) -> String {
    format!("correct horse {username}")
}

pub fn ids(posts: &Value) -> Vec<i64> {
    posts
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["id"].as_i64().unwrap())
        .collect()
}
