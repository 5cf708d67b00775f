//! In-process store provisioner with fault injection.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use kw_domain::error::{Error, Result};
use parking_lot::RwLock;

use crate::provisioner::{AccessPolicy, StoreProvisioner};

#[derive(Debug, Default, Clone)]
struct StoreState {
    policy: AccessPolicy,
    /// session key → roles
    keys: HashMap<String, Vec<String>>,
}

/// Keeps stores, their policies and their authorized keys in memory.
///
/// Stores marked with [`set_unavailable`](Self::set_unavailable) fail every
/// call with `StoreUnavailable`, which is how tests simulate an unreachable
/// backend.
#[derive(Default)]
pub struct MemoryProvisioner {
    stores: RwLock<HashMap<String, StoreState>>,
    down: RwLock<HashSet<String>>,
}

impl MemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, store: &str, down: bool) {
        let mut set = self.down.write();
        if down {
            set.insert(store.to_owned());
        } else {
            set.remove(store);
        }
    }

    pub fn exists(&self, store: &str) -> bool {
        self.stores.read().contains_key(store)
    }

    pub fn is_authorized(&self, store: &str, key: &str) -> bool {
        self.stores
            .read()
            .get(store)
            .is_some_and(|s| s.keys.contains_key(key))
    }

    /// Authorized keys on `store`, sorted.
    pub fn authorized_keys(&self, store: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .stores
            .read()
            .get(store)
            .map(|s| s.keys.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Roles `key` was authorized with on `store`.
    pub fn granted_roles(&self, store: &str, key: &str) -> Option<Vec<String>> {
        self.stores
            .read()
            .get(store)
            .and_then(|s| s.keys.get(key).cloned())
    }

    pub fn policy(&self, store: &str) -> Option<AccessPolicy> {
        self.stores.read().get(store).map(|s| s.policy.clone())
    }

    fn check(&self, store: &str) -> Result<()> {
        if self.down.read().contains(store) {
            return Err(Error::StoreUnavailable {
                store: store.to_owned(),
                reason: "store is unreachable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StoreProvisioner for MemoryProvisioner {
    async fn create_store(&self, name: &str) -> Result<bool> {
        self.check(name)?;
        let mut stores = self.stores.write();
        if stores.contains_key(name) {
            return Ok(false);
        }
        stores.insert(name.to_owned(), StoreState::default());
        Ok(true)
    }

    async fn destroy_store(&self, name: &str) -> Result<()> {
        self.check(name)?;
        self.stores.write().remove(name);
        Ok(())
    }

    async fn set_store_access_policy(&self, name: &str, policy: &AccessPolicy) -> Result<()> {
        self.check(name)?;
        let mut stores = self.stores.write();
        let state = stores.get_mut(name).ok_or_else(|| Error::StoreUnavailable {
            store: name.to_owned(),
            reason: "no such store".into(),
        })?;
        state.policy = policy.clone();
        Ok(())
    }

    async fn authorize_key(&self, store: &str, key: &str, roles: &[String]) -> Result<()> {
        self.check(store)?;
        let mut stores = self.stores.write();
        let state = stores.get_mut(store).ok_or_else(|| Error::StoreUnavailable {
            store: store.to_owned(),
            reason: "no such store".into(),
        })?;
        state.keys.insert(key.to_owned(), roles.to_vec());
        Ok(())
    }

    async fn deauthorize_key(&self, store: &str, key: &str) -> Result<()> {
        self.check(store)?;
        if let Some(state) = self.stores.write().get_mut(store) {
            state.keys.remove(key);
        }
        Ok(())
    }
}
