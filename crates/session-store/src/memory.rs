//! In-process session store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kw_domain::error::Result;
use kw_domain::Clock;
use parking_lot::RwLock;

use crate::store::{SessionStore, StoredEntry};

/// Session store backed by a `HashMap`. Lost on restart; intended for single
/// instance deployments and tests.
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of entries held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, key: &str, ttl: Duration, value: &str) -> Result<()> {
        let entry = StoredEntry::new(value, ttl, self.clock.now_ms());
        self.entries.write().insert(key.to_owned(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now_ms();

        // Fast path: live entry under the read lock.
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.data.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: drop it unless a concurrent put replaced it meanwhile.
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        let mut entries = self.entries.write();
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count())
    }

    async fn remove_expired(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        Ok(before - entries.len())
    }
}
