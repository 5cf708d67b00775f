use serde::{Deserialize, Serialize};
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Security: sessions, hashing, lockout
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Roles given to newly registered accounts.
    #[serde(default = "d_default_roles")]
    pub default_roles: Vec<String>,

    /// Consecutive wrong passwords before the account is locked.
    #[serde(default = "d_3")]
    pub max_failed_logins: u32,

    /// How long a lockout lasts, in seconds.
    #[serde(default = "d_600")]
    pub lockout_time_secs: u64,

    /// Lifetime of an issued session, in seconds. Refresh extends by the
    /// same amount.
    #[serde(default = "d_86400")]
    pub session_life_secs: u64,

    /// PBKDF2 iteration count used for new digests. Existing digests keep
    /// the count they were derived with.
    #[serde(default = "d_10000")]
    pub hash_iterations: u32,

    /// What a failed-login counter is keyed on.
    #[serde(default)]
    pub lockout_scope: LockoutScope,

    /// Refuse password logins for accounts without a confirmed email.
    #[serde(default)]
    pub require_email_confirm: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            default_roles: d_default_roles(),
            max_failed_logins: 3,
            lockout_time_secs: 600,
            session_life_secs: 86_400,
            hash_iterations: 10_000,
            lockout_scope: LockoutScope::Account,
            require_email_confirm: false,
        }
    }
}

impl SecurityConfig {
    pub fn session_life(&self) -> Duration {
        Duration::from_secs(self.session_life_secs)
    }

    pub fn lockout_time(&self) -> Duration {
        Duration::from_secs(self.lockout_time_secs)
    }
}

/// Granularity of failed-login counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockoutScope {
    /// One counter per account, whatever the source address.
    #[default]
    Account,
    /// One counter per (account, source address) pair.
    AccountAndAddress,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_default_roles() -> Vec<String> {
    vec!["user".into()]
}
fn d_3() -> u32 {
    3
}
fn d_600() -> u64 {
    600
}
fn d_86400() -> u64 {
    86_400
}
fn d_10000() -> u32 {
    10_000
}
