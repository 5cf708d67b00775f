//! Bounded optimistic read-modify-write over the account repository.

use std::time::Duration;

use kw_domain::account::{Account, Versioned};
use kw_domain::config::ConcurrencyConfig;
use kw_domain::error::{Error, Result};
use kw_domain::io::bounded;
use kw_domain::trace::TraceEvent;
use rand::Rng;

use crate::repository::AccountRepository;

/// Retry bound and per-call timeout for account mutations.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub io_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &ConcurrencyConfig) -> Self {
        Self {
            max_attempts: cfg.max_update_attempts.max(1),
            io_timeout: cfg.io_timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ConcurrencyConfig::default())
    }
}

/// Read the account, apply `f` to a copy, and write it back conditioned on
/// the revision read. A lost race re-reads and re-applies `f`, up to
/// `policy.max_attempts` times, then fails with `ConcurrentUpdateConflict`.
///
/// `f` must be a pure function of the account it is given: it may run once
/// per attempt. An error from `f` aborts without writing. When `f` leaves the
/// account unchanged no write is issued.
pub async fn modify_account<R, T, F>(
    repo: &R,
    account_id: &str,
    policy: &RetryPolicy,
    mut f: F,
) -> Result<(T, Versioned<Account>)>
where
    R: AccountRepository + ?Sized,
    F: FnMut(&mut Account) -> Result<T>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let current = bounded(
            policy.io_timeout,
            "account read",
            repo.get_account(account_id),
        )
        .await?;

        let mut next = current.value.clone();
        let out = f(&mut next)?;
        if next == current.value {
            return Ok((out, current));
        }

        match bounded(
            policy.io_timeout,
            "account write",
            repo.put_account(&next, current.revision),
        )
        .await
        {
            Ok(revision) => {
                return Ok((
                    out,
                    Versioned {
                        value: next,
                        revision,
                    },
                ))
            }
            Err(Error::RevisionConflict { .. }) => {
                TraceEvent::AccountUpdateRetried {
                    account_id: account_id.to_owned(),
                    attempt,
                }
                .emit();
                if attempt < attempts {
                    tokio::time::sleep(backoff(attempt)).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    tracing::warn!(account_id, attempts, "account update gave up after repeated conflicts");
    Err(Error::ConcurrentUpdateConflict {
        account_id: account_id.to_owned(),
        attempts,
    })
}

/// Short randomized pause so racing writers spread out.
fn backoff(attempt: u32) -> Duration {
    let base = 5u64 << attempt.min(5);
    let jitter = rand::thread_rng().gen_range(0..=base);
    Duration::from_millis(base + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        assert!(backoff(1) >= Duration::from_millis(10));
        assert!(backoff(1) <= Duration::from_millis(20));
        assert!(backoff(30) <= Duration::from_millis(320));
    }

    #[test]
    fn policy_never_allows_zero_attempts() {
        let cfg = ConcurrencyConfig {
            max_update_attempts: 0,
            io_timeout_ms: 10,
        };
        assert_eq!(RetryPolicy::from_config(&cfg).max_attempts, 1);
    }
}
