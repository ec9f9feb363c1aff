#![allow(dead_code)]
use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::Value;
use slotguard_backend::{
    app,
    config::Config,
    services::{
        credentials::{CredentialVerifier, StaticCredentials},
        session_pool::SessionPool,
        session_store::SessionStore,
    },
    state::AppState,
    utils::time::ManualClock,
};
use tempfile::TempDir;
use tower::ServiceExt;

pub const T0: u32 = 1_700_000_000;
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "correct-horse-battery";
pub const USER_AGENT: &str = "slotguard-test/1.0";
pub const JWT_SECRET: &str = "integration-test-secret-0123456789";

pub fn peer() -> SocketAddr {
    SocketAddr::from(([203, 0, 113, 7], 5000))
}

pub fn test_config(capacity: usize, store_path: &std::path::Path) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("JWT_SECRET", JWT_SECRET.to_string()),
        ("SESSION_CAPACITY", capacity.to_string()),
        ("SESSION_STORE_PATH", store_path.display().to_string()),
        ("ADMIN_USERNAME", USERNAME.to_string()),
        ("ADMIN_PASSWORD", PASSWORD.to_string()),
    ]);
    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn new(capacity: usize) -> Self {
        let credentials: Arc<dyn CredentialVerifier> =
            Arc::new(StaticCredentials::from_plaintext(USERNAME, PASSWORD).expect("hash"));
        Self::with_credentials(capacity, credentials)
    }

    pub fn with_credentials(capacity: usize, credentials: Arc<dyn CredentialVerifier>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(capacity, &dir.path().join("sessions.bin"));
        let clock = Arc::new(ManualClock::new(T0));
        let sessions = Arc::new(SessionPool::new(capacity, clock.clone()).expect("pool"));
        let store = SessionStore::new(config.session_store_path.clone());
        let state = AppState::new(sessions, store, credentials, config);
        Self {
            router: app(state.clone()),
            state,
            clock,
            dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    pub async fn login(&self) -> Value {
        self.login_from(peer(), USER_AGENT).await
    }

    pub async fn login_from(&self, addr: SocketAddr, user_agent: &str) -> Value {
        let response = self
            .send(
                TestRequest::post("/api/auth/login")
                    .json(serde_json::json!({ "username": USERNAME, "password": PASSWORD }))
                    .from(addr, user_agent)
                    .build(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }
}

/// Request builder carrying the client fingerprint inputs.
pub struct TestRequest {
    method: &'static str,
    uri: String,
    body: Option<Value>,
    bearer: Option<String>,
    addr: SocketAddr,
    user_agent: String,
}

impl TestRequest {
    pub fn new(method: &'static str, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            body: None,
            bearer: None,
            addr: peer(),
            user_agent: USER_AGENT.to_string(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new("POST", uri)
    }

    pub fn put(uri: impl Into<String>) -> Self {
        Self::new("PUT", uri)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new("DELETE", uri)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn from(mut self, addr: SocketAddr, user_agent: &str) -> Self {
        self.addr = addr;
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder()
            .method(self.method)
            .uri(self.uri)
            .header(header::USER_AGENT, self.user_agent);
        if let Some(token) = self.bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match self.body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let mut request = builder.body(body).expect("request");
        request.extensions_mut().insert(ConnectInfo(self.addr));
        request
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn token<'a>(value: &'a Value, field: &str) -> &'a str {
    value[field].as_str().expect("token field")
}
