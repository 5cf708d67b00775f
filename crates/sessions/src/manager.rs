//! Session lifecycle: issue, confirm, refresh, enumerate, revoke.
//!
//! The session store is the authority on whether a key is live. The
//! account's session map is a summary kept for enumeration and bulk
//! revocation; it is mutated only through [`modify_account`].
//!
//! Revocation drops the summary before deleting the record, so a missing
//! summary marks a key as revoked. `refresh` checks for it on both sides of
//! its write and never resurrects a revoked record.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use kw_accounts::{modify_account, AccountRepository, RetryPolicy};
use kw_dbauth::{DbAuthorizationManager, StoreFailure};
use kw_domain::account::{Account, SessionSummary};
use kw_domain::clock::duration_ms;
use kw_domain::error::{Error, Result};
use kw_domain::io::bounded;
use kw_domain::session::{ActiveSession, IssuedSession, SessionRecord};
use kw_domain::trace::TraceEvent;
use kw_domain::Clock;
use kw_session_store::SessionStore;
use serde::Serialize;

use crate::hasher::CredentialHasher;
use crate::keys::{generate_key, generate_secret};

/// One key a bulk revocation could not cleanly revoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevokeFailure {
    pub key: String,
    pub reason: String,
}

/// Outcome of a bulk revocation. Each key lands in exactly one list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevokeReport {
    /// Sessions revoked with every grant removed.
    pub revoked: Vec<String>,
    /// Keys that were already gone from the session store.
    pub missing: Vec<String>,
    /// Keys whose revocation hit an error. A session listed here may be gone
    /// from the session store with grants left behind on some stores.
    pub failed: Vec<RevokeFailure>,
}

impl RevokeReport {
    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

enum KeyOutcome {
    Revoked,
    Missing,
    Failed(String),
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    accounts: Arc<dyn AccountRepository>,
    dbauth: Arc<DbAuthorizationManager>,
    hasher: CredentialHasher,
    session_life: Duration,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        accounts: Arc<dyn AccountRepository>,
        dbauth: Arc<DbAuthorizationManager>,
        hasher: CredentialHasher,
        session_life: Duration,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            accounts,
            dbauth,
            hasher,
            session_life,
            policy,
            clock,
        }
    }

    pub fn session_life(&self) -> Duration {
        self.session_life
    }

    // ── Store helpers ────────────────────────────────────────────────

    async fn load(&self, key: &str) -> Result<Option<SessionRecord>> {
        let raw = bounded(self.policy.io_timeout, "session get", self.store.get(key)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) if record.is_expired(self.clock.now_ms()) => Ok(None),
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(key, error = %e, "unreadable session record, treating as absent");
                Ok(None)
            }
        }
    }

    async fn save(&self, record: &SessionRecord, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(record)?;
        bounded(
            self.policy.io_timeout,
            "session put",
            self.store.put(&record.key, ttl, &json),
        )
        .await
    }

    async fn get_account(&self, id: &str) -> Result<Account> {
        bounded(self.policy.io_timeout, "account read", self.accounts.get_account(id))
            .await
            .map(|v| v.value)
    }

    /// Physical stores a session of `account` may hold grants on: every
    /// store in the account's map plus whatever the record itself names.
    fn grant_stores(account: Option<&Account>, record: Option<&SessionRecord>) -> Vec<String> {
        let mut stores: BTreeSet<String> = BTreeSet::new();
        if let Some(account) = account {
            stores.extend(account.store_names());
        }
        if let Some(record) = record {
            let names: Vec<String> = record.user_dbs.keys().cloned().collect();
            let resolved = match account {
                Some(account) => DbAuthorizationManager::resolve_targets(account, &names),
                None => DbAuthorizationManager::resolve_targets(&Account::default(), &names),
            };
            stores.extend(resolved.into_iter().map(|t| t.physical));
        }
        stores.into_iter().collect()
    }

    fn log_orphans(key: &str, failures: &[StoreFailure]) {
        for f in failures {
            tracing::warn!(key, store = %f.store, reason = %f.reason, "grant left orphaned");
            TraceEvent::GrantOrphaned {
                store: f.store.clone(),
                key: key.to_owned(),
                reason: f.reason.clone(),
            }
            .emit();
        }
    }

    // ── Issue ────────────────────────────────────────────────────────

    /// Issue a new session for `user_id`, authorized on every named store.
    ///
    /// All-or-nothing: if any grant, the session-store write, or the account
    /// update fails, whatever was already done is undone and the error is
    /// returned. The plaintext secret exists only in the returned value.
    pub async fn issue(
        &self,
        user_id: &str,
        provider: &str,
        source_address: Option<&str>,
        roles: &[String],
        stores: &[String],
    ) -> Result<IssuedSession> {
        let account = self.get_account(user_id).await?;
        let key = generate_key();
        let secret = generate_secret();
        let derived = self.hasher.derive(&secret).await?;

        let targets = DbAuthorizationManager::resolve_targets(&account, stores);
        let user_dbs = self.dbauth.grant_all(&key, &targets, roles).await?;
        let physical: Vec<String> = targets.iter().map(|t| t.physical.clone()).collect();

        let issued = self.clock.now_ms();
        let expires = issued + duration_ms(self.session_life);
        let record = SessionRecord {
            key: key.clone(),
            user_id: user_id.to_owned(),
            salt: derived.salt,
            derived_key: derived.derived_key,
            iterations: derived.iterations,
            issued,
            expires,
            roles: roles.to_vec(),
            provider: provider.to_owned(),
            ip: source_address.map(str::to_owned),
            user_dbs: user_dbs.clone(),
        };

        if let Err(e) = self.save(&record, self.session_life).await {
            self.undo_issue(&key, &physical, false).await;
            return Err(e);
        }

        let summary = SessionSummary {
            issued,
            expires,
            provider: provider.to_owned(),
            ip: record.ip.clone(),
            roles: roles.to_vec(),
        };
        let recorded = modify_account(self.accounts.as_ref(), user_id, &self.policy, |a| {
            a.session.insert(key.clone(), summary.clone());
            Ok(())
        })
        .await;
        if let Err(e) = recorded {
            self.undo_issue(&key, &physical, true).await;
            return Err(e);
        }

        tracing::info!(user_id, key = %key, provider, stores = physical.len(), "session issued");
        TraceEvent::SessionIssued {
            user_id: user_id.to_owned(),
            key: key.clone(),
            provider: provider.to_owned(),
            stores: physical.len(),
            expires,
        }
        .emit();

        Ok(IssuedSession {
            key,
            password: secret,
            user_id: user_id.to_owned(),
            issued,
            expires,
            roles: roles.to_vec(),
            provider: provider.to_owned(),
            user_dbs,
        })
    }

    async fn undo_issue(&self, key: &str, stores: &[String], stored: bool) {
        if stored {
            let keys = [key.to_owned()];
            if let Err(e) =
                bounded(self.policy.io_timeout, "session delete", self.store.delete_many(&keys)).await
            {
                tracing::warn!(key, error = %e, "failed to remove session record during rollback");
            }
        }
        let failures = self.dbauth.revoke_everywhere(stores, &[key.to_owned()]).await;
        Self::log_orphans(key, &failures);
        tracing::warn!(
            key,
            rolled_back = stores.len() - failures.len(),
            orphaned = failures.len(),
            "session issue rolled back"
        );
    }

    // ── Confirm / refresh ────────────────────────────────────────────

    /// Verify `secret` against the live session `key`. Read-only.
    pub async fn confirm(&self, key: &str, secret: &str) -> Result<SessionRecord> {
        let record = self.load(key).await?.ok_or(Error::SessionNotFound)?;
        let ok = self
            .hasher
            .verify(
                secret,
                Some(&record.salt),
                Some(&record.derived_key),
                Some(record.iterations),
            )
            .await?;
        if !ok {
            tracing::debug!(key, "session secret mismatch");
            return Err(Error::InvalidCredential);
        }
        Ok(record)
    }

    /// `confirm`, then push the expiry out by one session life. Key, secret
    /// and grants are unchanged.
    ///
    /// A revocation that races the refresh wins: the refresh answers
    /// `SessionNotFound` and leaves no record behind.
    pub async fn refresh(&self, key: &str, secret: &str) -> Result<SessionRecord> {
        let mut record = self.confirm(key, secret).await?;
        record.expires = self.clock.now_ms() + duration_ms(self.session_life);
        let expires = record.expires;

        let updated = modify_account(self.accounts.as_ref(), &record.user_id, &self.policy, |a| {
            match a.session.get_mut(key) {
                Some(summary) => {
                    summary.expires = expires;
                    Ok(())
                }
                None => Err(Error::SessionNotFound),
            }
        })
        .await;
        match updated {
            Ok(_) => {}
            Err(Error::AccountNotFound(_)) => return Err(Error::SessionNotFound),
            Err(e) => return Err(e),
        }

        self.save(&record, self.session_life).await?;

        // A revocation that landed while the record was being written has
        // already dropped the summary; take the record back out.
        let still_listed = match self.get_account(&record.user_id).await {
            Ok(account) => account.session.contains_key(key),
            Err(Error::AccountNotFound(_)) => false,
            Err(e) => return Err(e),
        };
        if !still_listed {
            tracing::debug!(key, "session revoked during refresh");
            let keys = [key.to_owned()];
            bounded(self.policy.io_timeout, "session delete", self.store.delete_many(&keys)).await?;
            return Err(Error::SessionNotFound);
        }

        TraceEvent::SessionRefreshed {
            user_id: record.user_id.clone(),
            key: key.to_owned(),
            expires,
        }
        .emit();
        Ok(record)
    }

    // ── Revoke ───────────────────────────────────────────────────────

    /// Revoke one session. Returns `false` if the key was unknown or already
    /// revoked. Grants that cannot be removed are logged as orphaned; the
    /// session itself is gone regardless.
    pub async fn revoke_one(&self, key: &str) -> Result<bool> {
        match self.revoke_key(key, None).await {
            KeyOutcome::Revoked => Ok(true),
            KeyOutcome::Missing => Ok(false),
            KeyOutcome::Failed(reason) => {
                // Still report success if the record itself is gone.
                if self.load(key).await?.is_none() {
                    Ok(true)
                } else {
                    Err(Error::Other(reason))
                }
            }
        }
    }

    /// Revoke each key independently.
    pub async fn revoke_many(&self, keys: &[String]) -> RevokeReport {
        let outcomes = join_all(keys.iter().map(|k| self.revoke_key(k, None))).await;
        Self::report(keys, outcomes)
    }

    /// Revoke every session of `account_id` except `keep`.
    pub async fn revoke_all_except(
        &self,
        account_id: &str,
        keep: Option<&str>,
    ) -> Result<RevokeReport> {
        let account = self.get_account(account_id).await?;
        let keys: Vec<String> = account
            .session_keys()
            .into_iter()
            .filter(|k| Some(k.as_str()) != keep)
            .collect();
        let outcomes = join_all(keys.iter().map(|k| self.revoke_key(k, Some(account_id)))).await;
        let report = Self::report(&keys, outcomes);
        tracing::info!(
            account_id,
            revoked = report.revoked.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "bulk revocation finished"
        );
        Ok(report)
    }

    /// Log out every other session of the account that owns `key`.
    pub async fn revoke_others(&self, key: &str) -> Result<RevokeReport> {
        let record = self.load(key).await?.ok_or(Error::SessionNotFound)?;
        self.revoke_all_except(&record.user_id, Some(key)).await
    }

    fn report(keys: &[String], outcomes: Vec<KeyOutcome>) -> RevokeReport {
        let mut report = RevokeReport::default();
        for (key, outcome) in keys.iter().zip(outcomes) {
            match outcome {
                KeyOutcome::Revoked => report.revoked.push(key.clone()),
                KeyOutcome::Missing => report.missing.push(key.clone()),
                KeyOutcome::Failed(reason) => report.failed.push(RevokeFailure {
                    key: key.clone(),
                    reason,
                }),
            }
        }
        report
    }

    /// Drop the summary, delete the record, deauthorize the key everywhere.
    ///
    /// When the record is already gone but `owner` is known, grants and the
    /// summary are still cleaned up and the key is reported missing.
    async fn revoke_key(&self, key: &str, owner: Option<&str>) -> KeyOutcome {
        let record = match self.load(key).await {
            Ok(r) => r,
            Err(e) => return KeyOutcome::Failed(e.to_string()),
        };
        let Some(user_id) = record
            .as_ref()
            .map(|r| r.user_id.clone())
            .or_else(|| owner.map(str::to_owned))
        else {
            return KeyOutcome::Missing;
        };

        let removed = modify_account(self.accounts.as_ref(), &user_id, &self.policy, |a| {
            Ok(a.session.remove(key))
        })
        .await;
        let (summary, account) = match removed {
            Ok((summary, account)) => (summary, Some(account.value)),
            Err(Error::AccountNotFound(_)) => (None, None),
            Err(e) => return KeyOutcome::Failed(e.to_string()),
        };

        if record.is_some() {
            let keys = [key.to_owned()];
            if let Err(e) =
                bounded(self.policy.io_timeout, "session delete", self.store.delete_many(&keys)).await
            {
                self.restore_summary(&user_id, key, summary).await;
                return KeyOutcome::Failed(e.to_string());
            }
        }

        let stores = Self::grant_stores(account.as_ref(), record.as_ref());
        let failures = self.dbauth.revoke_everywhere(&stores, &[key.to_owned()]).await;
        Self::log_orphans(key, &failures);

        if record.is_none() {
            return KeyOutcome::Missing;
        }
        TraceEvent::SessionRevoked {
            user_id,
            key: key.to_owned(),
            orphaned_grants: failures.len(),
        }
        .emit();
        match failures.first() {
            None => KeyOutcome::Revoked,
            Some(f) => KeyOutcome::Failed(format!("grant orphaned on {}: {}", f.store, f.reason)),
        }
    }

    /// Put back a summary dropped by a revocation whose record delete failed,
    /// so the still-live session stays listed.
    async fn restore_summary(&self, user_id: &str, key: &str, summary: Option<SessionSummary>) {
        let Some(summary) = summary else {
            return;
        };
        let restored = modify_account(self.accounts.as_ref(), user_id, &self.policy, |a| {
            a.session.entry(key.to_owned()).or_insert_with(|| summary.clone());
            Ok(())
        })
        .await;
        if let Err(e) = restored {
            tracing::warn!(key, user_id, error = %e, "failed to restore session summary");
        }
    }

    // ── Enumerate / sweep ────────────────────────────────────────────

    /// Live sessions of the account. Summaries whose record is expired or
    /// missing from the session store are pruned from the map and their
    /// grants removed. A summary whose record cannot be read right now is
    /// listed as is and left alone.
    pub async fn enumerate(&self, account_id: &str) -> Result<Vec<ActiveSession>> {
        let account = self.get_account(account_id).await?;
        let now = self.clock.now_ms();

        let checks = account.session.iter().map(|(key, summary)| async move {
            let live = if summary.expires <= now {
                false
            } else {
                match self.load(key).await {
                    Ok(record) => record.is_some(),
                    Err(e) => {
                        tracing::warn!(account_id, key = %key, error = %e, "session store unreadable, keeping summary");
                        true
                    }
                }
            };
            (key, summary, live)
        });
        let mut active = Vec::new();
        let mut stale = Vec::new();
        for (key, summary, live) in join_all(checks).await {
            if live {
                active.push(ActiveSession {
                    key: key.clone(),
                    issued: summary.issued,
                    expires: summary.expires,
                    provider: summary.provider.clone(),
                    ip: summary.ip.clone(),
                });
            } else {
                stale.push(key.clone());
            }
        }

        if !stale.is_empty() {
            tracing::debug!(account_id, pruned = stale.len(), "pruning stale session summaries");
            let failures = self
                .dbauth
                .revoke_everywhere(&account.store_names(), &stale)
                .await;
            for f in &failures {
                tracing::warn!(account_id, store = %f.store, reason = %f.reason, "stale grant left orphaned");
            }
            modify_account(self.accounts.as_ref(), account_id, &self.policy, |a| {
                for key in &stale {
                    a.session.remove(key);
                }
                Ok(())
            })
            .await?;
        }

        active.sort_by_key(|s| s.issued);
        Ok(active)
    }

    /// Drop every summary whose expiry has passed, deauthorize those keys on
    /// the account's stores, and delete any leftover session records.
    /// Returns the keys removed.
    pub async fn remove_expired_keys(&self, account_id: &str) -> Result<Vec<String>> {
        let now = self.clock.now_ms();
        let (expired, account) = modify_account(self.accounts.as_ref(), account_id, &self.policy, |a| {
            let expired: Vec<String> = a
                .session
                .iter()
                .filter(|(_, s)| s.expires <= now)
                .map(|(k, _)| k.clone())
                .collect();
            for key in &expired {
                a.session.remove(key);
            }
            Ok(expired)
        })
        .await?;
        if expired.is_empty() {
            return Ok(expired);
        }

        let failures = self
            .dbauth
            .revoke_everywhere(&account.value.store_names(), &expired)
            .await;
        for f in &failures {
            tracing::warn!(account_id, store = %f.store, reason = %f.reason, "expired grant left orphaned");
        }
        bounded(
            self.policy.io_timeout,
            "session delete",
            self.store.delete_many(&expired),
        )
        .await?;
        tracing::info!(account_id, removed = expired.len(), "expired sessions removed");
        Ok(expired)
    }
}
