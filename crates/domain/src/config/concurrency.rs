use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Optimistic-concurrency and I/O bounds shared by every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Read-modify-write attempts against the account repository before
    /// giving up with `ConcurrentUpdateConflict`.
    #[serde(default = "d_5")]
    pub max_update_attempts: u32,
    /// Upper bound on any single backend call.
    #[serde(default = "d_5000")]
    pub io_timeout_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_update_attempts: 5,
            io_timeout_ms: 5000,
        }
    }
}

impl ConcurrencyConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

fn d_5() -> u32 {
    5
}
fn d_5000() -> u64 {
    5000
}
