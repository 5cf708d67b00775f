mod concurrency;
mod security;
mod session_store;
mod user_dbs;

pub use concurrency::*;
pub use security::*;
pub use session_store::*;
pub use user_dbs::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub session_store: SessionStoreConfig,
    #[serde(default)]
    pub user_dbs: UserDbsConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

/// Remote retry counts above this draw a validation warning.
const MAX_REASONABLE_RETRIES: u32 = 10;

impl ConfigError {
    fn error(field: &str, message: &str) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: &str) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.security.session_life_secs == 0 {
            errors.push(ConfigError::error(
                "security.session_life_secs",
                "session life must be greater than 0",
            ));
        }

        if self.security.max_failed_logins == 0 {
            errors.push(ConfigError::error(
                "security.max_failed_logins",
                "max failed logins must be greater than 0",
            ));
        }

        if self.security.lockout_time_secs == 0 {
            errors.push(ConfigError::warning(
                "security.lockout_time_secs",
                "a zero lockout time disables lockout entirely",
            ));
        }

        if self.security.hash_iterations == 0 {
            errors.push(ConfigError::error(
                "security.hash_iterations",
                "hash iterations must be greater than 0",
            ));
        } else if self.security.hash_iterations < 1_000 {
            errors.push(ConfigError::warning(
                "security.hash_iterations",
                "fewer than 1000 iterations is weak for password storage",
            ));
        }

        match self.session_store.adapter {
            SessionAdapter::Memory => {}
            SessionAdapter::File => {
                if self.session_store.file.sessions_root.as_os_str().is_empty() {
                    errors.push(ConfigError::error(
                        "session_store.file.sessions_root",
                        "sessions_root must not be empty for the file adapter",
                    ));
                }
            }
            SessionAdapter::Remote => {
                if self.session_store.remote.url.is_empty() {
                    errors.push(ConfigError::error(
                        "session_store.remote.url",
                        "url must not be empty for the remote adapter",
                    ));
                }
                if self.session_store.remote.max_retries > MAX_REASONABLE_RETRIES {
                    errors.push(ConfigError::warning(
                        "session_store.remote.max_retries",
                        &format!(
                            "more than {MAX_REASONABLE_RETRIES} retries stalls callers for minutes on an outage"
                        ),
                    ));
                }
                if self.session_store.remote.timeout_ms == 0 {
                    errors.push(ConfigError::error(
                        "session_store.remote.timeout_ms",
                        "timeout must be greater than 0",
                    ));
                }
            }
        }

        if self.concurrency.max_update_attempts == 0 {
            errors.push(ConfigError::error(
                "concurrency.max_update_attempts",
                "at least one attempt is required",
            ));
        }

        if self.concurrency.io_timeout_ms == 0 {
            errors.push(ConfigError::error(
                "concurrency.io_timeout_ms",
                "I/O timeout must be greater than 0",
            ));
        }

        if self.user_dbs.private_prefix.is_empty() {
            errors.push(ConfigError::error(
                "user_dbs.private_prefix",
                "private prefix must not be empty",
            ));
        }

        errors
    }
}
