//! In-process mock of the two GigaChat endpoints.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;

use gigapost_bot::config::{self, EnvOverrides, GigaChatConfig};
use gigapost_bot::llm::providers::gigachat::GigaChatClient;

pub const API_KEY: &str = "a2V5OnNlY3JldA==";

/// Canned responses for each endpoint.
#[derive(Clone)]
pub struct Script {
    pub auth_status: u16,
    pub auth_body: String,
    pub completion_status: u16,
    pub completion_body: String,
}

impl Script {
    pub fn ok(content: &str) -> Self {
        Self {
            auth_status: 200,
            auth_body: r#"{"access_token":"abc","expires_at":4102444800000}"#.to_string(),
            completion_status: 200,
            completion_body: serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": content }, "index": 0 }],
                "model": "GigaChat",
                "object": "chat.completion"
            })
            .to_string(),
        }
    }

    pub fn auth(mut self, status: u16, body: &str) -> Self {
        self.auth_status = status;
        self.auth_body = body.to_string();
        self
    }

    pub fn completion(mut self, status: u16, body: &str) -> Self {
        self.completion_status = status;
        self.completion_body = body.to_string();
        self
    }
}

/// One request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub headers: HeaderMap,
    pub body: String,
}

impl Seen {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
    }
}

struct Shared {
    script: Script,
    auth: Mutex<Vec<Seen>>,
    completions: Mutex<Vec<Seen>>,
    auth_calls: AtomicUsize,
    completion_calls: AtomicUsize,
}

pub struct MockGigaChat {
    pub base: String,
    shared: Arc<Shared>,
}

impl MockGigaChat {
    pub async fn spawn(script: Script) -> Self {
        let shared = Arc::new(Shared {
            script,
            auth: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
            auth_calls: AtomicUsize::new(0),
            completion_calls: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/v2/oauth", post(oauth))
            .route("/api/v1/chat/completions", post(completions))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base: format!("http://{addr}"), shared }
    }

    pub fn auth_calls(&self) -> usize {
        self.shared.auth_calls.load(Ordering::SeqCst)
    }

    pub fn completion_calls(&self) -> usize {
        self.shared.completion_calls.load(Ordering::SeqCst)
    }

    pub fn auth_requests(&self) -> Vec<Seen> {
        self.shared.auth.lock().unwrap().clone()
    }

    pub fn completion_requests(&self) -> Vec<Seen> {
        self.shared.completions.lock().unwrap().clone()
    }

    /// Default GigaChat config pointed at this mock.
    pub fn config(&self) -> GigaChatConfig {
        let mut cfg = config::load_from(None, EnvOverrides::default())
            .unwrap()
            .generator
            .gigachat;
        cfg.auth_url = format!("{}/api/v2/oauth", self.base);
        cfg.api_url = format!("{}/api/v1/chat/completions", self.base);
        cfg.timeout_seconds = 5;
        cfg
    }

    pub fn client(&self) -> GigaChatClient {
        GigaChatClient::new(&self.config(), API_KEY.to_string()).unwrap()
    }
}

async fn oauth(State(s): State<Arc<Shared>>, headers: HeaderMap, body: String) -> axum::response::Response {
    s.auth_calls.fetch_add(1, Ordering::SeqCst);
    s.auth.lock().unwrap().push(Seen { headers, body });
    respond(s.script.auth_status, &s.script.auth_body)
}

async fn completions(State(s): State<Arc<Shared>>, headers: HeaderMap, body: String) -> axum::response::Response {
    s.completion_calls.fetch_add(1, Ordering::SeqCst);
    s.completions.lock().unwrap().push(Seen { headers, body });
    respond(s.script.completion_status, &s.script.completion_body)
}

fn respond(status: u16, body: &str) -> axum::response::Response {
    use axum::response::IntoResponse;
    let status = StatusCode::from_u16(status).unwrap();
    (status, [(CONTENT_TYPE, "application/json")], body.to_string()).into_response()
}
