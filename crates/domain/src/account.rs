//! The account document as held by the external account repository.
//!
//! The core never assigns into a stored account directly; it mutates a copy
//! and writes it back conditioned on the revision it read.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Monotonic document revision used for optimistic concurrency.
pub type Revision = u64;

/// An account together with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub revision: Revision,
}

/// One registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Account {
    /// Stable identifier (also the login name).
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Authentication providers linked to this account (`local`, `google`, …).
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalCredential>,
    /// session key → summary of the live session.
    #[serde(default)]
    pub session: BTreeMap<String, SessionSummary>,
    /// logical store name → descriptor.
    #[serde(default)]
    pub personal_dbs: BTreeMap<String, PersonalStore>,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Keys of every session recorded on the account.
    pub fn session_keys(&self) -> Vec<String> {
        self.session.keys().cloned().collect()
    }

    /// Physical names of every personal store the account owns.
    pub fn store_names(&self) -> Vec<String> {
        self.personal_dbs.values().map(|s| s.name.clone()).collect()
    }

    /// Keys of the sessions whose recorded expiry is still ahead of `now_ms`.
    pub fn live_session_keys(&self, now_ms: i64) -> Vec<String> {
        self.live_sessions(now_ms).map(|(k, _)| k.clone()).collect()
    }

    pub fn live_sessions(&self, now_ms: i64) -> impl Iterator<Item = (&String, &SessionSummary)> {
        self.session.iter().filter(move |(_, s)| s.expires > now_ms)
    }
}

/// Password credential plus failed-login bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LocalCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    #[serde(flatten)]
    pub lockout: LockoutState,
    /// Per-source-address counters, used when lockout is scoped to
    /// `(account, address)`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub address_lockouts: BTreeMap<String, LockoutState>,
}

impl LocalCredential {
    pub fn has_password(&self) -> bool {
        self.derived_key.is_some()
    }
}

/// Failed-attempt counter and lockout deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LockoutState {
    #[serde(default)]
    pub failed_login_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<i64>,
}

impl LockoutState {
    pub fn is_locked(&self, now_ms: i64) -> bool {
        self.locked_until.is_some_and(|until| until > now_ms)
    }
}

/// Compact per-session entry kept on the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub issued: i64,
    pub expires: i64,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Roles the session was issued with. Stores provisioned later grant
    /// the session exactly these.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Whether a personal store belongs to one account or is shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Private,
    Shared,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// Descriptor of one personal store in the account's store map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalStore {
    /// Physical store name on the data-store server.
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: StoreKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_sessions_filter_by_expiry() {
        let mut account = Account::new("alice");
        for (key, expires) in [("k1", 100), ("k2", 300)] {
            account.session.insert(
                key.into(),
                SessionSummary {
                    issued: 0,
                    expires,
                    provider: "local".into(),
                    ip: None,
                    roles: Vec::new(),
                },
            );
        }
        assert_eq!(account.live_session_keys(200), vec!["k2".to_string()]);
        assert_eq!(account.session_keys().len(), 2);
    }

    #[test]
    fn lockout_fields_flatten_into_local() {
        let local = LocalCredential {
            salt: Some("aa".into()),
            derived_key: Some("bb".into()),
            iterations: Some(10),
            lockout: LockoutState {
                failed_login_attempts: 2,
                locked_until: Some(99),
            },
            address_lockouts: BTreeMap::new(),
        };
        let json = serde_json::to_value(&local).unwrap();
        assert_eq!(json["failed_login_attempts"], 2);
        assert_eq!(json["locked_until"], 99);
        let back: LocalCredential = serde_json::from_value(json).unwrap();
        assert_eq!(back, local);
    }

    #[test]
    fn store_kind_serializes_as_type() {
        let store = PersonalStore {
            name: "team".into(),
            kind: StoreKind::Shared,
        };
        let json = serde_json::to_string(&store).unwrap();
        assert_eq!(json, r#"{"name":"team","type":"shared"}"#);
    }
}
