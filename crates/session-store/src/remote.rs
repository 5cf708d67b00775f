//! Networked cache backend speaking the Redis-over-HTTP command protocol.
//!
//! Every command is a `POST` of a JSON array (`["SET", key, value, "PX", ttl]`)
//! to the configured URL; the reply is `{"result": …}` or `{"error": "…"}`.
//! Transient failures (5xx, timeouts, connection errors) are retried with
//! exponential back-off; 4xx replies are permanent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use kw_domain::config::RemoteStoreConfig;
use kw_domain::error::{Error, Result};
use kw_domain::trace::TraceEvent;
use kw_domain::Clock;
use reqwest::Client;
use serde_json::{json, Value};

use crate::store::{SessionStore, StoredEntry};

const BACKOFF_BASE_MS: u64 = 50;
const BACKOFF_CAP_MS: u64 = 5_000;

/// Delay before retry number `attempt` (1-based): doubling from 50ms,
/// capped at 5s.
fn backoff(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor).min(BACKOFF_CAP_MS))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct RemoteSessionStore {
    http: Client,
    url: String,
    token: Option<String>,
    key_prefix: String,
    max_retries: u32,
    clock: Arc<dyn Clock>,
}

impl RemoteSessionStore {
    /// Build a client from config, reading the bearer token from the
    /// environment variable named by `token_env`.
    pub fn new(cfg: &RemoteStoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let token = std::env::var(&cfg.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        Self::with_token(cfg, token, clock)
    }

    pub fn with_token(
        cfg: &RemoteStoreConfig,
        token: Option<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if cfg.url.is_empty() {
            return Err(Error::Config("session_store.remote.url is empty".into()));
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            url: cfg.url.trim_end_matches('/').to_owned(),
            token,
            key_prefix: cfg.key_prefix.clone(),
            max_retries: cfg.max_retries,
            clock,
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Send one command, retrying transient failures.
    async fn command(&self, args: Vec<Value>) -> Result<Value> {
        let name = args
            .first()
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_owned();
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }

            let mut rb = self
                .http
                .post(&self.url)
                .header("X-Request-Id", uuid::Uuid::new_v4().to_string())
                .json(&args);
            if let Some(ref token) = self.token {
                rb = rb.bearer_auth(token);
            }

            let start = Instant::now();
            let result = rb.send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    TraceEvent::SessionStoreCall {
                        backend: "remote".into(),
                        command: name.clone(),
                        status: status.as_u16(),
                        duration_ms,
                    }
                    .emit();

                    let body = resp.text().await.map_err(from_reqwest)?;
                    if status.is_server_error() {
                        last_err = Some(Error::Http(format!("{name} returned {status}: {body}")));
                        continue;
                    }
                    if status.is_client_error() {
                        return Err(Error::Http(format!("{name} rejected ({status}): {body}")));
                    }
                    return parse_reply(&name, &body);
                }
                Err(e) => {
                    TraceEvent::SessionStoreCall {
                        backend: "remote".into(),
                        command: name.clone(),
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        duration_ms,
                    }
                    .emit();
                    last_err = Some(from_reqwest(e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Http(format!("{name}: all retries exhausted"))))
    }
}

fn parse_reply(name: &str, body: &str) -> Result<Value> {
    let mut reply: Value = serde_json::from_str(body)
        .map_err(|e| Error::Http(format!("{name}: unparseable reply: {e}: {body}")))?;
    if let Some(err) = reply.get("error").and_then(Value::as_str) {
        return Err(Error::Http(format!("{name}: {err}")));
    }
    Ok(reply.get_mut("result").map(Value::take).unwrap_or(Value::Null))
}

/// Convert a `reqwest::Error` into the shared error type.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl SessionStore for RemoteSessionStore {
    fn backend(&self) -> &'static str {
        "remote"
    }

    async fn put(&self, key: &str, ttl: Duration, value: &str) -> Result<()> {
        let entry = StoredEntry::new(value, ttl, self.clock.now_ms());
        let payload = serde_json::to_string(&entry)?;
        // PX 0 is rejected by the protocol; the envelope already marks the
        // entry expired in that case.
        let px = ttl.as_millis().clamp(1, u64::MAX as u128) as u64;
        self.command(vec![
            json!("SET"),
            json!(self.full_key(key)),
            json!(payload),
            json!("PX"),
            json!(px),
        ])
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let reply = self
            .command(vec![json!("GET"), json!(self.full_key(key))])
            .await?;
        let raw = match reply {
            Value::Null => return Ok(None),
            Value::String(raw) => raw,
            other => {
                return Err(Error::Http(format!("GET: unexpected reply {other}")));
            }
        };
        let entry: StoredEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt remote session entry");
                return Ok(None);
            }
        };
        if entry.is_live(self.clock.now_ms()) {
            Ok(Some(entry.data))
        } else {
            Ok(None)
        }
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut args = Vec::with_capacity(keys.len() + 1);
        args.push(json!("DEL"));
        args.extend(keys.iter().map(|k| json!(self.full_key(k))));
        let reply = self.command(args).await?;
        Ok(reply.as_u64().unwrap_or(0) as usize)
    }
}
