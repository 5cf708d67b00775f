//! On-disk session store: one `<key>.json` file per session.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kw_domain::error::{Error, Result};
use kw_domain::Clock;

use crate::store::{SessionStore, StoredEntry};

/// Session store writing JSON envelopes under a root directory.
///
/// Writes go to a temporary file that is renamed into place, so readers
/// never observe a half-written entry.
pub struct FileSessionStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileSessionStore {
    pub fn new(root: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self { root, clock }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for `key`, rejecting anything that could escape the root.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if !is_safe_key(key) {
            return Err(Error::Other(format!("invalid session key for file store: {key:?}")));
        }
        Ok(self.root.join(format!("{key}.json")))
    }

    async fn read_entry(&self, path: &Path) -> Result<Option<StoredEntry>> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "corrupt session file");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn put(&self, key: &str, ttl: Duration, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let entry = StoredEntry::new(value, ttl, self.clock.now_ms());
        let json = serde_json::to_vec(&entry)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let tmp = self
            .root
            .join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Io(e));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        let Some(entry) = self.read_entry(&path).await? else {
            return Ok(None);
        };
        if entry.is_live(self.clock.now_ms()) {
            Ok(Some(entry.data))
        } else {
            Ok(None)
        }
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        let mut removed = 0;
        for key in keys {
            // A key the store would refuse to write cannot exist on disk.
            let Ok(path) = self.path_for(key) else {
                continue;
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(removed)
    }

    async fn remove_expired(&self) -> Result<usize> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::Io(e)),
        };

        let now = self.clock.now_ms();
        let mut removed = 0;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stale = match self.read_entry(&path).await? {
                Some(entry) => !entry.is_live(now),
                None => true,
            };
            if stale {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(Error::Io(e)),
                }
            }
        }

        tracing::debug!(removed, root = %self.root.display(), "swept expired session files");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kw_domain::ManualClock;

    #[test]
    fn unsafe_keys_rejected() {
        assert!(is_safe_key("abc_DEF-123"));
        assert!(!is_safe_key(""));
        assert!(!is_safe_key("../etc/passwd"));
        assert!(!is_safe_key("a/b"));
        assert!(!is_safe_key("a.b"));
    }

    #[tokio::test]
    async fn writes_one_file_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(
            dir.path().join("sessions"),
            Arc::new(ManualClock::default()),
        );
        store.put("k1", Duration::from_secs(5), "v").await.unwrap();
        assert!(dir.path().join("sessions/k1.json").exists());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf(), Arc::new(ManualClock::default()));
        assert_eq!(store.get("bad").await.unwrap(), None);
        assert_eq!(store.remove_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn sweep_on_missing_root_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("absent"), Arc::new(ManualClock::default()));
        assert_eq!(store.remove_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn put_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf(), Arc::new(ManualClock::default()));
        let err = store
            .put("../escape", Duration::from_secs(1), "v")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }
}
