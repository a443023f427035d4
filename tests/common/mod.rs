// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use examredi::{
    config::Config,
    models::{
        chat::ChatMessage,
        user::{Role, Subscription, User},
    },
    providers::{AiProvider, Mailer, ProviderError},
    routes,
    state::{AppState, Store},
    store::{self, Collection, DocumentStore, MemoryStore, StoreError, Versioned},
    utils::hash::hash_password,
};
use serde_json::{Value, json};

/// AI stand-in. `None` behaves like a server without an API key.
pub struct StubAi {
    pub reply: Option<String>,
}

impl StubAi {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
        }
    }

    pub fn unconfigured() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl AiProvider for StubAi {
    fn is_configured(&self) -> bool {
        self.reply.is_some()
    }

    async fn generate(&self, _prompt: &str, _system: Option<&str>) -> Result<String, ProviderError> {
        self.reply.clone().ok_or(ProviderError::NotConfigured("stub"))
    }

    async fn chat(
        &self,
        history: &[ChatMessage],
        _message: &str,
        _system: Option<&str>,
    ) -> Result<String, ProviderError> {
        let reply = self.reply.clone().ok_or(ProviderError::NotConfigured("stub"))?;
        Ok(format!("{reply} ({} earlier)", history.len()))
    }
}

/// In-memory store whose conditional writes all lose once `armed` is set,
/// as if another writer always got there first.
pub struct ConflictingStore {
    inner: MemoryStore,
    armed: AtomicBool,
    replace_calls: AtomicUsize,
}

impl ConflictingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(false),
            replace_calls: AtomicUsize::new(0),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn replace_calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for ConflictingStore {
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Versioned<Value>>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Value,
    ) -> Result<Vec<Versioned<Value>>, StoreError> {
        self.inner.find(collection, filter).await
    }

    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        unique_key: Option<&str>,
        body: &Value,
    ) -> Result<(), StoreError> {
        self.inner.insert(collection, id, unique_key, body).await
    }

    async fn replace(
        &self,
        collection: Collection,
        id: &str,
        expected_version: i64,
        unique_key: Option<&str>,
        body: &Value,
    ) -> Result<i64, StoreError> {
        if !self.armed.load(Ordering::SeqCst) {
            return self
                .inner
                .replace(collection, id, expected_version, unique_key, body)
                .await;
        }
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::VersionConflict {
            collection,
            id: id.to_string(),
        })
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(collection, id).await
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        self.inner.count(collection).await
    }
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Records outgoing mail instead of sending it.
#[derive(Default)]
pub struct StubMailer {
    pub sent: Mutex<Vec<SentEmail>>,
}

impl StubMailer {
    /// Token at the end of the link in the last email sent to `to`.
    pub fn last_token_for(&self, to: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let email = sent.iter().rev().find(|e| e.to == to)?;
        let start = email.html.find("href=\"")? + "href=\"".len();
        let end = start + email.html[start..].find('"')?;
        email.html[start..end].rsplit('/').next().map(str::to_string)
    }
}

#[async_trait]
impl Mailer for StubMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), ProviderError> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

pub struct TestApp {
    pub address: String,
    pub store: Store,
    pub mailer: Arc<StubMailer>,
    pub client: reqwest::Client,
}

pub fn test_config() -> Config {
    Config {
        database_url: "memory://".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        refresh_expiration: 3600,
        rust_log: "error".to_string(),
        port: 0,
        admin_email: None,
        admin_password: None,
        gemini_api_key: None,
        gemini_model: "test-model".to_string(),
        brevo_api_key: None,
        from_email: "support@examredi.test".to_string(),
        frontend_url: "http://localhost:5173".to_string(),
        rate_limit: false,
    }
}

/// Spawns the app on a random port with an in-memory store.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(StubAi::replying("Happy to help!")).await
}

pub async fn spawn_app_with(ai: StubAi) -> TestApp {
    spawn_app_on(Arc::new(MemoryStore::new()), ai).await
}

/// Spawns the app on top of the given store.
pub async fn spawn_app_on(store: Store, ai: StubAi) -> TestApp {
    let mailer = Arc::new(StubMailer::default());

    let state = AppState {
        store: store.clone(),
        config: test_config(),
        ai: Arc::new(ai),
        mailer: mailer.clone(),
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        mailer,
        client: reqwest::Client::new(),
    }
}

pub fn unique_email() -> String {
    format!("u_{}@example.com", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Registers through the API and returns the response body.
    pub async fn register(&self, email: &str, password: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "name": "Test Student", "email": email, "password": password }))
            .send()
            .await
            .expect("Register failed");
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("Failed to parse register json")
    }

    pub async fn login(&self, email: &str, password: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Login failed");
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.expect("Failed to parse login json")
    }

    /// Registers a free user and returns its access token.
    pub async fn free_user(&self) -> String {
        let body = self.register(&unique_email(), "password123").await;
        body["accessToken"].as_str().expect("Token not found").to_string()
    }

    /// Inserts a user straight into the store and logs in. Returns the access token.
    pub async fn seeded_user(&self, role: Role, subscription: Subscription) -> String {
        let email = unique_email();
        let mut user = User::new(
            "Seeded".to_string(),
            &email,
            Some(hash_password("password123").unwrap()),
        );
        user.role = role;
        user.set_subscription(subscription);
        store::create(self.store.as_ref(), &user).await.unwrap();

        let body = self.login(&email, "password123").await;
        body["accessToken"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: &Value,
    ) -> reqwest::Response {
        let mut request = self.client.request(method, self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> reqwest::Response {
        self.send_json(reqwest::Method::POST, path, token, body).await
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: &Value) -> reqwest::Response {
        self.send_json(reqwest::Method::PUT, path, token, body).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.delete(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }
}
