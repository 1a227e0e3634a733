use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use tokio::task::JoinHandle;

/// Tracks environment variable mutations and restores originals on drop.
pub struct EnvGuard {
    originals: HashMap<String, Option<String>>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn new() -> Self {
        Self {
            originals: HashMap::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.capture(key);
        std::env::set_var(key, value);
    }

    pub fn set_many(&mut self, entries: &[(&str, &str)]) {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.capture(key);
        std::env::remove_var(key);
    }

    fn capture(&mut self, key: &str) {
        if self.originals.contains_key(key) {
            return;
        }
        let original = std::env::var(key).ok();
        self.originals.insert(key.to_string(), original);
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, original) in self.originals.drain() {
            match original {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Behaviour of the mock generation endpoint for one attempt.
#[allow(dead_code)]
#[derive(Clone, Copy)]
pub enum Reply {
    Status(u16),
    Json(&'static str),
    Sleep(u64),
}

#[derive(Clone)]
struct MockState {
    script: Arc<Vec<Reply>>,
    hits: Arc<AtomicUsize>,
    prompts: Arc<std::sync::Mutex<Vec<serde_json::Value>>>,
}

/// A running mock generation endpoint.  Attempt `n` gets `script[n]`; the
/// last entry repeats once the script is exhausted.
#[allow(dead_code)]
pub struct MockAi {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
    pub bodies: Arc<std::sync::Mutex<Vec<serde_json::Value>>>,
    pub handle: JoinHandle<()>,
}

#[allow(dead_code)]
impl MockAi {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn generate(
    State(state): State<MockState>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let n = state.hits.fetch_add(1, Ordering::SeqCst);
    state.prompts.lock().unwrap().push(body);
    let reply = state
        .script
        .get(n)
        .or_else(|| state.script.last())
        .copied()
        .unwrap_or(Reply::Status(500));
    match reply {
        Reply::Status(code) => {
            let status = StatusCode::from_u16(code).unwrap();
            (status, Json(serde_json::json!({"error": "scripted"}))).into_response()
        }
        Reply::Json(raw) => {
            let v: serde_json::Value = serde_json::from_str(raw).unwrap();
            (StatusCode::OK, Json(v)).into_response()
        }
        Reply::Sleep(ms) => {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            (StatusCode::OK, Json(serde_json::json!({"response": "slow"}))).into_response()
        }
    }
}

#[allow(dead_code)]
pub async fn start_mock_ai(script: Vec<Reply>) -> MockAi {
    let hits = Arc::new(AtomicUsize::new(0));
    let bodies = Arc::new(std::sync::Mutex::new(Vec::new()));
    let state = MockState {
        script: Arc::new(script),
        hits: hits.clone(),
        prompts: bodies.clone(),
    };
    let app = Router::new()
        .route("/generate", post(generate))
        .with_state(state);
    let (addr, handle) = serve(app).await;
    MockAi {
        url: format!("http://{}/generate", addr),
        hits,
        bodies,
        handle,
    }
}

pub async fn serve(app: Router) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}
