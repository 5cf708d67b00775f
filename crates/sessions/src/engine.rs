//! Wires the components together over one configuration.

use std::sync::Arc;

use kw_accounts::{AccountRepository, RetryPolicy};
use kw_dbauth::{DbAuthorizationManager, StoreProvisioner};
use kw_domain::account::Account;
use kw_domain::config::Config;
use kw_domain::error::{Error, Result};
use kw_domain::io::bounded;
use kw_domain::Clock;
use kw_session_store::SessionStore;

use crate::hasher::CredentialHasher;
use crate::lockout::LockoutGuard;
use crate::login::{LocalAuthenticator, LOCAL_PROVIDER};
use crate::manager::{RevokeReport, SessionManager};

pub struct Engine {
    config: Config,
    accounts: Arc<dyn AccountRepository>,
    store: Arc<dyn SessionStore>,
    policy: RetryPolicy,
    hasher: CredentialHasher,
    dbauth: Arc<DbAuthorizationManager>,
    sessions: Arc<SessionManager>,
    lockout: Arc<LockoutGuard>,
    local: LocalAuthenticator,
}

impl Engine {
    pub fn new(
        config: Config,
        accounts: Arc<dyn AccountRepository>,
        provisioner: Arc<dyn StoreProvisioner>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let policy = RetryPolicy::from_config(&config.concurrency);
        let hasher = CredentialHasher::new(config.security.hash_iterations);

        let dbauth = Arc::new(DbAuthorizationManager::new(
            config.user_dbs.clone(),
            provisioner,
            accounts.clone(),
            policy,
            clock.clone(),
        )?);
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            accounts.clone(),
            dbauth.clone(),
            hasher,
            config.security.session_life(),
            policy,
            clock.clone(),
        ));
        let lockout = Arc::new(LockoutGuard::new(
            accounts.clone(),
            &config.security,
            policy,
            clock,
        ));
        let local = LocalAuthenticator::new(
            accounts.clone(),
            sessions.clone(),
            lockout.clone(),
            hasher,
            config.security.require_email_confirm,
            policy,
        );

        Ok(Self {
            config,
            accounts,
            store,
            policy,
            hasher,
            dbauth,
            sessions,
            lockout,
            local,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn dbauth(&self) -> &Arc<DbAuthorizationManager> {
        &self.dbauth
    }

    pub fn lockout(&self) -> &Arc<LockoutGuard> {
        &self.lockout
    }

    pub fn local(&self) -> &LocalAuthenticator {
        &self.local
    }

    /// Create an account (with a password if given) and provision its
    /// default stores. Accounts without roles get the configured defaults.
    pub async fn register_account(&self, mut account: Account, password: Option<&str>) -> Result<Account> {
        if account.roles.is_empty() {
            account.roles = self.config.security.default_roles.clone();
        }
        if let Some(password) = password {
            let derived = self.hasher.derive(password).await?;
            let local = account.local.get_or_insert_with(Default::default);
            local.salt = Some(derived.salt);
            local.derived_key = Some(derived.derived_key);
            local.iterations = Some(derived.iterations);
            if !account.providers.iter().any(|p| p == LOCAL_PROVIDER) {
                account.providers.push(LOCAL_PROVIDER.to_owned());
            }
        }

        bounded(
            self.policy.io_timeout,
            "account create",
            self.accounts.create_account(&account),
        )
        .await?;
        self.dbauth.provision_defaults(&account.id).await?;
        tracing::info!(account_id = %account.id, "account registered");

        bounded(
            self.policy.io_timeout,
            "account read",
            self.accounts.get_account(&account.id),
        )
        .await
        .map(|v| v.value)
    }

    /// Revoke every session, deprovision every store, delete the account.
    pub async fn remove_account(&self, account_id: &str, destroy_data: bool) -> Result<RevokeReport> {
        let report = self.sessions.revoke_all_except(account_id, None).await?;
        self.dbauth.deprovision_all(account_id, destroy_data).await?;

        let attempts = self.policy.max_attempts;
        for _ in 0..attempts {
            let current = bounded(
                self.policy.io_timeout,
                "account read",
                self.accounts.get_account(account_id),
            )
            .await?;
            match bounded(
                self.policy.io_timeout,
                "account delete",
                self.accounts.delete_account(account_id, current.revision),
            )
            .await
            {
                Ok(()) => {
                    tracing::info!(account_id, "account removed");
                    return Ok(report);
                }
                Err(Error::RevisionConflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::ConcurrentUpdateConflict {
            account_id: account_id.to_owned(),
            attempts,
        })
    }

    /// Sweep expired entries from the session store.
    pub async fn sweep_expired(&self) -> Result<usize> {
        bounded(
            self.policy.io_timeout,
            "session sweep",
            self.store.remove_expired(),
        )
        .await
    }

    /// Release session-store resources.
    pub async fn shutdown(&self) -> Result<()> {
        self.store.quit().await
    }
}
