//! Password login and bearer-token authentication.

use std::sync::Arc;

use kw_accounts::{modify_account, AccountRepository, RetryPolicy};
use kw_domain::error::{Error, Result};
use kw_domain::io::bounded;
use kw_domain::session::{IssuedSession, SessionRecord};

use crate::hasher::CredentialHasher;
use crate::keys::parse_bearer;
use crate::lockout::LockoutGuard;
use crate::manager::{RevokeReport, SessionManager};

pub const LOCAL_PROVIDER: &str = "local";

pub struct LocalAuthenticator {
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<SessionManager>,
    lockout: Arc<LockoutGuard>,
    hasher: CredentialHasher,
    require_email_confirm: bool,
    policy: RetryPolicy,
}

impl LocalAuthenticator {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        sessions: Arc<SessionManager>,
        lockout: Arc<LockoutGuard>,
        hasher: CredentialHasher,
        require_email_confirm: bool,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            accounts,
            sessions,
            lockout,
            hasher,
            require_email_confirm,
            policy,
        }
    }

    /// Verify a password and issue a session on every store the account
    /// owns.
    ///
    /// Unknown accounts and wrong passwords both answer `InvalidCredential`;
    /// only a wrong password counts toward lockout.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        source_address: Option<&str>,
    ) -> Result<IssuedSession> {
        let found = bounded(
            self.policy.io_timeout,
            "account lookup",
            self.accounts.find_account_by_login(identifier),
        )
        .await?;
        let Some(found) = found else {
            tracing::debug!(identifier, "login for unknown account");
            return Err(Error::InvalidCredential);
        };
        let account = found.value;

        if let Some(locked_until) = self.lockout.locked_until(&account, source_address) {
            return Err(Error::AccountLocked { locked_until });
        }
        let Some(local) = account.local.as_ref().filter(|l| l.has_password()) else {
            return Err(Error::InvalidCredential);
        };

        let ok = self
            .hasher
            .verify(
                password,
                local.salt.as_deref(),
                local.derived_key.as_deref(),
                local.iterations,
            )
            .await?;
        if !ok {
            let attempt = self.lockout.register_failure(&account.id, source_address).await?;
            return Err(match (attempt.locked, attempt.locked_until) {
                (true, Some(locked_until)) => Error::AccountLocked { locked_until },
                _ => Error::InvalidCredential,
            });
        }

        if self.require_email_confirm && account.email.is_none() {
            return Err(Error::EmailUnconfirmed);
        }

        self.lockout.record_success(&account.id, source_address).await?;
        let stores: Vec<String> = account.personal_dbs.keys().cloned().collect();
        self.sessions
            .issue(
                &account.id,
                LOCAL_PROVIDER,
                source_address,
                &account.roles,
                &stores,
            )
            .await
    }

    /// Authenticate a `key:secret` bearer token.
    pub async fn authenticate_bearer(&self, token: &str) -> Result<SessionRecord> {
        let (key, secret) = parse_bearer(token)?;
        self.sessions.confirm(key, secret).await
    }

    /// Replace the account's password and log out every other session.
    ///
    /// `current` must match when the account already has a password.
    /// Lockout state is cleared along with the old credential.
    pub async fn change_password(
        &self,
        account_id: &str,
        current: Option<&str>,
        new_password: &str,
        keep_session: Option<&str>,
    ) -> Result<RevokeReport> {
        let account = bounded(
            self.policy.io_timeout,
            "account read",
            self.accounts.get_account(account_id),
        )
        .await?
        .value;

        if let Some(local) = account.local.as_ref().filter(|l| l.has_password()) {
            let supplied = current.ok_or(Error::InvalidCredential)?;
            let ok = self
                .hasher
                .verify(
                    supplied,
                    local.salt.as_deref(),
                    local.derived_key.as_deref(),
                    local.iterations,
                )
                .await?;
            if !ok {
                return Err(Error::InvalidCredential);
            }
        }

        let derived = self.hasher.derive(new_password).await?;
        modify_account(self.accounts.as_ref(), account_id, &self.policy, |a| {
            let local = a.local.get_or_insert_with(Default::default);
            local.salt = Some(derived.salt.clone());
            local.derived_key = Some(derived.derived_key.clone());
            local.iterations = Some(derived.iterations);
            local.lockout = Default::default();
            local.address_lockouts.clear();
            if !a.providers.iter().any(|p| p == LOCAL_PROVIDER) {
                a.providers.push(LOCAL_PROVIDER.to_owned());
            }
            Ok(())
        })
        .await?;
        tracing::info!(account_id, "password changed");

        self.sessions.revoke_all_except(account_id, keep_session).await
    }
}
