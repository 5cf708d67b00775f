use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Run a backend call with an upper bound on its latency.
///
/// Elapsing surfaces as [`Error::Timeout`] naming `what`; the inner future
/// is dropped, so any effect it already committed stays committed.
pub async fn bounded<T, F>(timeout: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "{what} exceeded {}ms",
            timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let result: Result<()> = bounded(Duration::from_millis(50), "probe", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout(msg)) if msg.contains("probe")));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let value = bounded(Duration::from_secs(1), "probe", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
