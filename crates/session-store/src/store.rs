//! The [`SessionStore`] capability and the envelope shared by all backends.

use std::time::Duration;

use async_trait::async_trait;
use kw_domain::clock::duration_ms;
use kw_domain::error::Result;
use serde::{Deserialize, Serialize};

/// Pluggable time-to-live key/value store.
///
/// * `put` overwrites and guarantees the value is unreadable once `ttl`
///   has elapsed.
/// * `get` never returns an expired value, swept or not.
/// * `delete_many` returns how many keys were actually removed; missing
///   keys are not an error.
///
/// Calls on disjoint keys are safe to run concurrently. Same-key writes
/// are last-write-wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short backend name for logs (`memory`, `file`, `remote`).
    fn backend(&self) -> &'static str;

    async fn put(&self, key: &str, ttl: Duration, value: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn delete_many(&self, keys: &[String]) -> Result<usize>;

    /// Remove one key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.delete_many(&[key.to_owned()]).await? > 0)
    }

    /// Sweep expired entries the backend has not dropped on its own.
    async fn remove_expired(&self) -> Result<usize> {
        Ok(0)
    }

    /// Release backend resources.
    async fn quit(&self) -> Result<()> {
        Ok(())
    }
}

/// On-disk / on-wire wrapper carrying the absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    pub data: String,
    pub expire: i64,
}

impl StoredEntry {
    pub fn new(value: &str, ttl: Duration, now_ms: i64) -> Self {
        Self {
            data: value.to_owned(),
            expire: now_ms.saturating_add(duration_ms(ttl)),
        }
    }

    pub fn is_live(&self, now_ms: i64) -> bool {
        self.expire > now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_expires_exactly_at_ttl() {
        let entry = StoredEntry::new("v", Duration::from_millis(100), 1_000);
        assert!(entry.is_live(1_099));
        assert!(!entry.is_live(1_100));
    }

    #[test]
    fn huge_ttl_saturates() {
        let entry = StoredEntry::new("v", Duration::MAX, 1_000);
        assert_eq!(entry.expire, i64::MAX);
    }
}
