#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kw_accounts::{AccountRepository, MemoryAccountRepository};
use kw_dbauth::{MemoryProvisioner, StoreProvisioner};
use kw_domain::account::{Account, PersonalStore, StoreKind};
use kw_domain::config::Config;
use kw_domain::error::{Error, Result};
use kw_domain::ManualClock;
use kw_session_store::{MemorySessionStore, SessionStore};
use kw_sessions::Engine;
use tokio::sync::Notify;

pub struct Harness<S = MemorySessionStore> {
    pub engine: Engine,
    pub repo: Arc<MemoryAccountRepository>,
    pub provisioner: Arc<MemoryProvisioner>,
    pub store: Arc<S>,
    pub clock: Arc<ManualClock>,
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.security.hash_iterations = 1000;
    config
}

/// Wire an engine over whatever session store `make_store` builds.
pub fn harness_over<S, F>(config: Config, make_store: F) -> Harness<S>
where
    S: SessionStore + 'static,
    F: FnOnce(Arc<ManualClock>) -> S,
{
    let repo = Arc::new(MemoryAccountRepository::new());
    let provisioner = Arc::new(MemoryProvisioner::new());
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(make_store(clock.clone()));
    let engine = Engine::new(
        config,
        repo.clone(),
        provisioner.clone(),
        store.clone(),
        clock.clone(),
    )
    .unwrap();
    Harness {
        engine,
        repo,
        provisioner,
        store,
        clock,
    }
}

pub fn harness_with(config: Config) -> Harness {
    harness_over(config, |clock| MemorySessionStore::new(clock))
}

pub fn harness() -> Harness {
    harness_with(config())
}

/// "alice" owns `private-alice` (private) and `shared-team` (shared), both
/// already created on the provisioner.
pub async fn alice<S: SessionStore + 'static>(h: &Harness<S>, password: Option<&str>) -> Account {
    let mut account = Account::new("alice");
    account.email = Some("alice@example.com".into());
    account.roles = vec!["user".into()];
    for (name, kind) in [
        ("private-alice", StoreKind::Private),
        ("shared-team", StoreKind::Shared),
    ] {
        h.provisioner.create_store(name).await.unwrap();
        account.personal_dbs.insert(
            name.into(),
            PersonalStore {
                name: name.into(),
                kind,
            },
        );
    }
    let account = h.engine.register_account(account, password).await.unwrap();
    assert_eq!(h.repo.get_account("alice").await.unwrap().value, account);
    account
}

pub fn stores() -> Vec<String> {
    vec!["private-alice".into(), "shared-team".into()]
}

pub fn roles() -> Vec<String> {
    vec!["user".into()]
}

/// A memory store whose reads can be switched to fail like an unreachable
/// backend.
pub struct FlakyStore {
    inner: MemorySessionStore,
    failing_reads: AtomicBool,
}

impl FlakyStore {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            inner: MemorySessionStore::new(clock),
            failing_reads: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn put(&self, key: &str, ttl: Duration, value: &str) -> Result<()> {
        self.inner.put(key, ttl, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(Error::Http("503 service unavailable".into()));
        }
        self.inner.get(key).await
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        self.inner.delete_many(keys).await
    }
}

/// A memory store that can park the next write until released.
pub struct GatedStore {
    inner: MemorySessionStore,
    hold_next_put: AtomicBool,
    pub put_waiting: Notify,
    pub release_put: Notify,
}

impl GatedStore {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            inner: MemorySessionStore::new(clock),
            hold_next_put: AtomicBool::new(false),
            put_waiting: Notify::new(),
            release_put: Notify::new(),
        }
    }

    pub fn hold_next_put(&self) {
        self.hold_next_put.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for GatedStore {
    fn backend(&self) -> &'static str {
        "gated"
    }

    async fn put(&self, key: &str, ttl: Duration, value: &str) -> Result<()> {
        if self.hold_next_put.swap(false, Ordering::SeqCst) {
            self.put_waiting.notify_one();
            self.release_put.notified().await;
        }
        self.inner.put(key, ttl, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        self.inner.delete_many(keys).await
    }
}
