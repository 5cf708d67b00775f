use serde::Serialize;

/// Structured trace events emitted across all keyward crates.
///
/// Session keys are public handles and safe to log; secrets never appear
/// in any variant.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionIssued {
        user_id: String,
        key: String,
        provider: String,
        stores: usize,
        expires: i64,
    },
    SessionRefreshed {
        user_id: String,
        key: String,
        expires: i64,
    },
    SessionRevoked {
        user_id: String,
        key: String,
        orphaned_grants: usize,
    },
    GrantRollback {
        key: String,
        failed_store: String,
        rolled_back: usize,
    },
    GrantOrphaned {
        store: String,
        key: String,
        reason: String,
    },
    LoginFailed {
        user_id: String,
        attempts: u32,
        locked: bool,
    },
    AccountLockedOut {
        user_id: String,
        locked_until: i64,
    },
    StoreProvisioned {
        user_id: String,
        store: String,
        kind: String,
        sessions_granted: usize,
    },
    StoreDeprovisioned {
        user_id: String,
        store: String,
        destroyed: bool,
    },
    AccountUpdateRetried {
        account_id: String,
        attempt: u32,
    },
    SessionStoreCall {
        backend: String,
        command: String,
        status: u16,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "kw_event");
    }
}
