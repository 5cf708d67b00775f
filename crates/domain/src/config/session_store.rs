use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStoreConfig {
    #[serde(default)]
    pub adapter: SessionAdapter,
    #[serde(default)]
    pub file: FileStoreConfig,
    #[serde(default)]
    pub remote: RemoteStoreConfig,
}

/// Which backend holds session records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAdapter {
    #[default]
    Memory,
    File,
    Remote,
}

impl std::fmt::Display for SessionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File => write!(f, "file"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStoreConfig {
    /// Directory holding one `<key>.json` file per session.
    #[serde(default = "d_sessions_root")]
    pub sessions_root: PathBuf,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            sessions_root: d_sessions_root(),
        }
    }
}

/// A networked cache speaking the Redis-over-HTTP command protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStoreConfig {
    #[serde(default)]
    pub url: String,
    /// Environment variable holding the bearer token. Unset means no
    /// `Authorization` header is sent.
    #[serde(default = "d_token_env")]
    pub token_env: String,
    /// Prefix applied to every key so several deployments can share a cache.
    #[serde(default = "d_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "d_5000")]
    pub timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token_env: d_token_env(),
            key_prefix: d_key_prefix(),
            timeout_ms: 5000,
            max_retries: 2,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_sessions_root() -> PathBuf {
    PathBuf::from("./data/sessions")
}
fn d_token_env() -> String {
    "KW_CACHE_TOKEN".into()
}
fn d_key_prefix() -> String {
    "kw:session:".into()
}
fn d_5000() -> u64 {
    5000
}
fn d_2() -> u32 {
    2
}
