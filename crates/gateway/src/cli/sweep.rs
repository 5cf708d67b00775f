//! `keyward sweep` — drop expired session-store entries.

use kw_domain::config::Config;

use crate::bootstrap;

pub async fn run(config: &Config) -> anyhow::Result<usize> {
    let store = bootstrap::open_session_store(config, bootstrap::system_clock())?;
    let removed = store.remove_expired().await?;
    store.quit().await?;
    tracing::info!(backend = store.backend(), removed, "session store swept");
    Ok(removed)
}
