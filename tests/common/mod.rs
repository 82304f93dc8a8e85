//! Shared utilities for integration tests.

#![allow(dead_code)]

use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use tap_admin::config::AppConfig;
use tap_admin::media::MemoryObjectStore;
use tap_admin::store::MemoryStore;
use tap_admin::{HttpServer, Shutdown};

pub const ROOT_EMAIL: &str = "root@taps.test";
pub const ROOT_PASSWORD: &str = "root-password";

/// A running server on an ephemeral port, backed by in-memory stores.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub store: Arc<MemoryStore>,
    pub media: Arc<MemoryObjectStore>,
    shutdown: Shutdown,
}

/// Config with cheap hashing and a limit high enough not to interfere.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.token_secret = "integration-test-secret-0123456789".to_string();
    config.auth.hash_memory_kib = 1024;
    config.auth.hash_iterations = 1;
    config.rate_limit.threshold = 1_000;
    config.observability.metrics_enabled = false;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_with(|_| {}).await
}

pub async fn spawn_with(tweak: impl FnOnce(&mut AppConfig)) -> TestApp {
    let mut config = test_config();
    tweak(&mut config);

    let store = Arc::new(MemoryStore::new());
    let media = Arc::new(MemoryObjectStore::default());
    let server = HttpServer::new(config, store.clone(), media.clone()).unwrap();
    server
        .state()
        .accounts
        .ensure_super_admin(ROOT_EMAIL, ROOT_PASSWORD)
        .await
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (_, updates) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(server.run(listener, updates, shutdown.subscribe()));

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestApp {
        addr,
        client,
        store,
        media,
        shutdown,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/admin/register"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    pub async fn login_response(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/admin/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Log in and return the token; panics on failure.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let res = self.login_response(email, password).await;
        assert_eq!(res.status(), 200, "login failed for {email}");
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn root_token(&self) -> String {
        self.login(ROOT_EMAIL, ROOT_PASSWORD).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.unwrap()
    }

    pub async fn set_role(&self, token: &str, email: &str, role: &str) -> reqwest::Response {
        self.client
            .put(self.url("/api/admin/update-role"))
            .bearer_auth(token)
            .json(&json!({ "email": email, "newRole": role }))
            .send()
            .await
            .unwrap()
    }

    /// Register an account and promote it to admin; returns its token.
    pub async fn admin_token(&self, email: &str) -> String {
        assert_eq!(self.register(email, "admin-pass").await.status(), 201);
        let root = self.root_token().await;
        assert_eq!(self.set_role(&root, email, "admin").await.status(), 200);
        self.login(email, "admin-pass").await
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

/// A complete tap form with a small PNG attached.
pub fn tap_form(liquid_type: &str, file_name: &str) -> Form {
    Form::new()
        .text("title", "Brass Keg Tap")
        .text("container_type", "Keg")
        .text("material", "Brass")
        .text("size", "3/4")
        .text("flow_rate", "Fast")
        .text("liquid_type", liquid_type.to_string())
        .text("description", "Classic tap")
        .part("productPictureFile", image_part(file_name))
}

pub fn image_part(file_name: &str) -> Part {
    Part::bytes(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a])
        .file_name(file_name.to_string())
        .mime_str("image/png")
        .unwrap()
}
