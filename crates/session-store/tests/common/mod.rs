//! In-process Redis-over-HTTP server for exercising the remote backend.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

#[derive(Default)]
pub struct MockState {
    pub data: HashMap<String, String>,
    /// Reply 503 to this many upcoming requests.
    pub fail_next: u32,
    pub calls: u32,
    pub required_token: Option<String>,
}

#[derive(Clone, Default)]
pub struct MockCache {
    pub state: Arc<Mutex<MockState>>,
}

impl MockCache {
    pub fn calls(&self) -> u32 {
        self.state.lock().calls
    }
}

async fn handle(
    State(cache): State<MockCache>,
    headers: HeaderMap,
    Json(cmd): Json<Vec<Value>>,
) -> (StatusCode, Json<Value>) {
    let mut state = cache.state.lock();
    state.calls += 1;

    if state.fail_next > 0 {
        state.fail_next -= 1;
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "try again" })),
        );
    }

    if let Some(ref token) = state.required_token {
        let presented = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(token.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            );
        }
    }

    let arg = |i: usize| cmd.get(i).and_then(Value::as_str).unwrap_or_default().to_owned();
    let result = match arg(0).as_str() {
        "SET" => {
            state.data.insert(arg(1), arg(2));
            json!("OK")
        }
        "GET" => state
            .data
            .get(&arg(1))
            .map(|v| json!(v))
            .unwrap_or(Value::Null),
        "DEL" => {
            let removed = (1..cmd.len())
                .filter(|&i| state.data.remove(&arg(i)).is_some())
                .count();
            json!(removed)
        }
        "PING" => json!("PONG"),
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("unknown command {other}") })),
            )
        }
    };
    (StatusCode::OK, Json(json!({ "result": result })))
}

/// Serve `cache` on an ephemeral port and return its base URL.
pub async fn spawn(cache: MockCache) -> String {
    let app = Router::new().route("/", post(handle)).with_state(cache);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
