/// Shared error type used across all keyward crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Unknown or expired session key. Both cases look identical to callers.
    #[error("session not found")]
    SessionNotFound,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("account locked until {locked_until}")]
    AccountLocked { locked_until: i64 },

    #[error("authorization propagation failed on {store}: {reason}")]
    AuthorizationPropagationFailed { store: String, reason: String },

    #[error("concurrent update conflict on account {account_id} after {attempts} attempt(s)")]
    ConcurrentUpdateConflict { account_id: String, attempts: u32 },

    #[error("store {store} unavailable: {reason}")]
    StoreUnavailable { store: String, reason: String },

    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// A single conditioned write lost the race. Retried by
    /// `kw_accounts::modify_account`.
    #[error("revision conflict on account {account_id}")]
    RevisionConflict { account_id: String },

    #[error("email address not confirmed")]
    EmailUnconfirmed,

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error came from an unreachable or slow backend rather
    /// than from the request itself.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::Timeout(_) | Self::Http(_) | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
