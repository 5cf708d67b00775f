//! Builds runtime components from a loaded [`Config`].

use std::sync::Arc;

use anyhow::Context;
use kw_domain::config::Config;
use kw_domain::{Clock, SystemClock};
use kw_session_store::{create_store, SessionStore};

pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Open the session store the configuration selects.
pub fn open_session_store(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<Arc<dyn SessionStore>> {
    let store = create_store(&config.session_store, clock).with_context(|| {
        format!(
            "opening {} session store",
            config.session_store.adapter
        )
    })?;
    tracing::debug!(backend = store.backend(), "session store opened");
    Ok(store)
}
