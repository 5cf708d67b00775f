//! Session records and the shapes handed back to callers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The persisted form of a live session, stored in the session store under
/// its key. The secret is present only as a salted digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub key: String,
    pub user_id: String,
    pub salt: String,
    pub derived_key: String,
    pub iterations: u32,
    pub issued: i64,
    pub expires: i64,
    pub roles: Vec<String>,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// logical store name → access token on that store.
    #[serde(default, rename = "userDBs")]
    pub user_dbs: BTreeMap<String, String>,
}

impl SessionRecord {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires <= now_ms
    }

    /// The caller-facing summary of this record.
    pub fn handoff(&self) -> SessionHandoff {
        SessionHandoff {
            key: self.key.clone(),
            expires: self.expires,
            roles: self.roles.clone(),
            provider: self.provider.clone(),
            user_dbs: self.user_dbs.clone(),
        }
    }
}

/// What `SessionManager::issue` returns. The plaintext secret exists only
/// here; it is never persisted.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct IssuedSession {
    pub key: String,
    pub password: String,
    pub user_id: String,
    pub issued: i64,
    pub expires: i64,
    pub roles: Vec<String>,
    pub provider: String,
    #[serde(rename = "userDBs")]
    pub user_dbs: BTreeMap<String, String>,
}

impl IssuedSession {
    pub fn handoff(&self) -> SessionHandoff {
        SessionHandoff {
            key: self.key.clone(),
            expires: self.expires,
            roles: self.roles.clone(),
            provider: self.provider.clone(),
            user_dbs: self.user_dbs.clone(),
        }
    }

    /// `key:secret`, the bearer token form accepted by
    /// `LocalAuthenticator::authenticate_bearer`.
    pub fn bearer_token(&self) -> String {
        format!("{}:{}", self.key, self.password)
    }
}

impl fmt::Debug for IssuedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedSession")
            .field("key", &self.key)
            .field("password", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("issued", &self.issued)
            .field("expires", &self.expires)
            .field("roles", &self.roles)
            .field("provider", &self.provider)
            .field("user_dbs", &self.user_dbs)
            .finish()
    }
}

/// The handoff contract to the routing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandoff {
    pub key: String,
    /// Epoch milliseconds.
    pub expires: i64,
    pub roles: Vec<String>,
    pub provider: String,
    #[serde(rename = "userDBs")]
    pub user_dbs: BTreeMap<String, String>,
}

/// A live session as listed by `SessionManager::enumerate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSession {
    pub key: String,
    pub issued: i64,
    pub expires: i64,
    pub provider: String,
    pub ip: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued() -> IssuedSession {
        IssuedSession {
            key: "k1".into(),
            password: "s3cret".into(),
            user_id: "alice".into(),
            issued: 1,
            expires: 2,
            roles: vec!["user".into()],
            provider: "local".into(),
            user_dbs: BTreeMap::from([("team".into(), "http://db/team".into())]),
        }
    }

    #[test]
    fn handoff_shape() {
        let json = serde_json::to_value(issued().handoff()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "key": "k1",
                "expires": 2,
                "roles": ["user"],
                "provider": "local",
                "userDBs": {"team": "http://db/team"}
            })
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", issued());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn bearer_token_joins_key_and_secret() {
        assert_eq!(issued().bearer_token(), "k1:s3cret");
    }
}
