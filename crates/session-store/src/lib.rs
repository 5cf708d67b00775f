//! `kw-session-store` — time-to-live key/value storage for session records.
//!
//! One capability trait, [`SessionStore`], with three interchangeable
//! backends selected by `session_store.adapter`:
//!
//! | Adapter  | Implementation         | Expiry enforcement                       |
//! |----------|------------------------|------------------------------------------|
//! | `memory` | [`MemorySessionStore`] | expiry stamp checked on read             |
//! | `file`   | [`FileSessionStore`]   | expiry stamp checked on read + sweep     |
//! | `remote` | [`RemoteSessionStore`] | native `PX` expiry + stamp check on read |
//!
//! Every backend wraps values in the same `{data, expire}` envelope and
//! compares `expire` against the injected clock, so an entry that the
//! backend has not swept yet is still never returned.
//!
//! The [`conformance`] module holds the behavioral suite every backend must
//! pass.

pub mod conformance;
pub mod file;
pub mod memory;
pub mod remote;
pub mod store;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
pub use remote::RemoteSessionStore;
pub use store::SessionStore;

use std::sync::Arc;

use kw_domain::config::{SessionAdapter, SessionStoreConfig};
use kw_domain::error::Result;
use kw_domain::Clock;

/// Build the backend named by `cfg.adapter`.
pub fn create_store(
    cfg: &SessionStoreConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn SessionStore>> {
    match cfg.adapter {
        SessionAdapter::Memory => {
            tracing::info!("using in-memory session store");
            Ok(Arc::new(MemorySessionStore::new(clock)))
        }
        SessionAdapter::File => {
            tracing::info!(
                root = %cfg.file.sessions_root.display(),
                "using file session store"
            );
            Ok(Arc::new(FileSessionStore::new(
                cfg.file.sessions_root.clone(),
                clock,
            )))
        }
        SessionAdapter::Remote => {
            let store = RemoteSessionStore::new(&cfg.remote, clock)?;
            tracing::info!(url = %cfg.remote.url, "using remote session store");
            Ok(Arc::new(store))
        }
    }
}
