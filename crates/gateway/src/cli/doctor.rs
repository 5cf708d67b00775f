use std::sync::Arc;
use std::time::Duration;

use kw_domain::config::{Config, ConfigSeverity};
use kw_domain::Clock;
use kw_session_store::SessionStore;

use crate::bootstrap;

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("keyward doctor");
    println!("==============\n");

    let mut all_passed = true;

    // 1. Config file
    check_config_file(config_path, &mut all_passed);

    // 2. Config validation
    check_config_validation(config, &mut all_passed);

    // 3. Session store round trip
    check_session_store(config, bootstrap::system_clock(), &mut all_passed).await;

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({} error(s))", issues.len(), error_count),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

async fn check_session_store(config: &Config, clock: Arc<dyn Clock>, all_passed: &mut bool) {
    let name = format!("Session store ({})", config.session_store.adapter);
    let store = match bootstrap::open_session_store(config, clock) {
        Ok(store) => store,
        Err(e) => {
            print_check(&name, false, format!("{e:#}"));
            *all_passed = false;
            return;
        }
    };

    match probe(store.as_ref()).await {
        Ok(()) => print_check(&name, true, "put/get/delete round trip ok".into()),
        Err(e) => {
            print_check(&name, false, e);
            *all_passed = false;
        }
    }
    if let Err(e) = store.quit().await {
        tracing::warn!(error = %e, "session store did not shut down cleanly");
    }
}

/// Write, read back and delete a throwaway key.
pub async fn probe(store: &dyn SessionStore) -> Result<(), String> {
    let key = format!("doctor-{}", uuid::Uuid::new_v4().simple());
    let value = "probe";
    store
        .put(&key, Duration::from_secs(30), value)
        .await
        .map_err(|e| format!("put failed: {e}"))?;
    let read = store
        .get(&key)
        .await
        .map_err(|e| format!("get failed: {e}"))?;
    if read.as_deref() != Some(value) {
        return Err(format!("read back {read:?}, expected {value:?}"));
    }
    let removed = store
        .delete(&key)
        .await
        .map_err(|e| format!("delete failed: {e}"))?;
    if !removed {
        return Err("probe key was not removed".into());
    }
    Ok(())
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use kw_domain::ManualClock;
    use kw_session_store::{FileSessionStore, MemorySessionStore};

    #[tokio::test]
    async fn probe_passes_on_memory_store() {
        let store = MemorySessionStore::new(Arc::new(ManualClock::default()));
        probe(&store).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn probe_passes_on_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf(), Arc::new(ManualClock::default()));
        probe(&store).await.unwrap();
    }
}
