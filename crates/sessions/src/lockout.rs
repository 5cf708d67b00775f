//! Failed-login counting and temporary lockout.
//!
//! Counters live on the account document, so every mutation goes through
//! [`modify_account`]: two concurrent wrong passwords are two increments,
//! never one.

use std::sync::Arc;

use kw_accounts::{modify_account, AccountRepository, RetryPolicy};
use kw_domain::account::{Account, LockoutState};
use kw_domain::clock::duration_ms;
use kw_domain::config::{LockoutScope, SecurityConfig};
use kw_domain::error::Result;
use kw_domain::trace::TraceEvent;
use kw_domain::Clock;

/// Result of recording one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedAttempt {
    pub locked: bool,
    /// Failures counted toward the next lockout (zero once locked).
    pub attempts: u32,
    pub locked_until: Option<i64>,
}

pub struct LockoutGuard {
    accounts: Arc<dyn AccountRepository>,
    max_failed: u32,
    lockout_ms: i64,
    scope: LockoutScope,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl LockoutGuard {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        security: &SecurityConfig,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            max_failed: security.max_failed_logins.max(1),
            lockout_ms: duration_ms(security.lockout_time()),
            scope: security.lockout_scope,
            policy,
            clock,
        }
    }

    /// The counter `address` is judged by under the configured scope.
    fn state<'a>(&self, account: &'a Account, address: Option<&str>) -> Option<&'a LockoutState> {
        let local = account.local.as_ref()?;
        match (self.scope, address) {
            (LockoutScope::AccountAndAddress, Some(addr)) => local.address_lockouts.get(addr),
            _ => Some(&local.lockout),
        }
    }

    fn state_mut<'a>(&self, account: &'a mut Account, address: Option<&str>) -> &'a mut LockoutState {
        let local = account.local.get_or_insert_with(Default::default);
        match (self.scope, address) {
            (LockoutScope::AccountAndAddress, Some(addr)) => {
                local.address_lockouts.entry(addr.to_owned()).or_default()
            }
            _ => &mut local.lockout,
        }
    }

    /// Pure read: is a lockout in force right now.
    pub fn is_locked(&self, account: &Account, address: Option<&str>) -> bool {
        self.locked_until(account, address).is_some()
    }

    /// The lockout deadline if one is in force.
    pub fn locked_until(&self, account: &Account, address: Option<&str>) -> Option<i64> {
        let now = self.clock.now_ms();
        self.state(account, address)
            .filter(|s| s.is_locked(now))
            .and_then(|s| s.locked_until)
    }

    /// Count a verified-wrong password. Returns whether the account is
    /// locked afterwards.
    pub async fn record_failure(&self, account_id: &str, address: Option<&str>) -> Result<bool> {
        Ok(self.register_failure(account_id, address).await?.locked)
    }

    pub async fn register_failure(
        &self,
        account_id: &str,
        address: Option<&str>,
    ) -> Result<FailedAttempt> {
        let now = self.clock.now_ms();
        let (outcome, _) = modify_account(self.accounts.as_ref(), account_id, &self.policy, |a| {
            let state = self.state_mut(a, address);
            if state.is_locked(now) {
                return Ok((
                    FailedAttempt {
                        locked: true,
                        attempts: state.failed_login_attempts,
                        locked_until: state.locked_until,
                    },
                    false,
                ));
            }
            state.locked_until = None;
            state.failed_login_attempts += 1;
            let mut newly_locked = false;
            if state.failed_login_attempts >= self.max_failed {
                state.locked_until = Some(now + self.lockout_ms);
                state.failed_login_attempts = 0;
                newly_locked = true;
            }
            Ok((
                FailedAttempt {
                    locked: newly_locked,
                    attempts: state.failed_login_attempts,
                    locked_until: state.locked_until,
                },
                newly_locked,
            ))
        })
        .await?;
        let (attempt, newly_locked) = outcome;

        TraceEvent::LoginFailed {
            user_id: account_id.to_owned(),
            attempts: attempt.attempts,
            locked: attempt.locked,
        }
        .emit();
        if let (true, Some(until)) = (newly_locked, attempt.locked_until) {
            tracing::warn!(account_id, locked_until = until, "account locked out");
            TraceEvent::AccountLockedOut {
                user_id: account_id.to_owned(),
                locked_until: until,
            }
            .emit();
        }
        Ok(attempt)
    }

    /// Clear the counter and any lockout for the scope `address` falls in.
    pub async fn record_success(&self, account_id: &str, address: Option<&str>) -> Result<()> {
        modify_account(self.accounts.as_ref(), account_id, &self.policy, |a| {
            let Some(local) = a.local.as_mut() else {
                return Ok(());
            };
            match (self.scope, address) {
                (LockoutScope::AccountAndAddress, Some(addr)) => {
                    local.address_lockouts.remove(addr);
                }
                _ => local.lockout = LockoutState::default(),
            }
            Ok(())
        })
        .await?;
        Ok(())
    }
}
