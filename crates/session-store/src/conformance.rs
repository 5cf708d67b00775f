//! Behavioral suite every [`SessionStore`] backend must pass.
//!
//! Each check takes the store under test and the [`ManualClock`] it was
//! built with, and panics on the first violated expectation. Backends
//! outside this crate can run [`run_all`] from their own tests.

use std::time::Duration;

use futures_util::future::join_all;
use kw_domain::ManualClock;

use crate::store::SessionStore;

const TTL: Duration = Duration::from_millis(1_000);

/// Run every check in sequence. Keys are namespaced by `prefix` so one
/// backend instance can be shared across runs.
pub async fn run_all(store: &dyn SessionStore, clock: &ManualClock, prefix: &str) {
    put_then_get(store, prefix).await;
    missing_key_is_none(store, prefix).await;
    overwrite_replaces_value(store, prefix).await;
    ttl_boundary(store, clock, prefix).await;
    overwrite_resets_ttl(store, clock, prefix).await;
    delete_many_counts_removed(store, prefix).await;
    delete_missing_is_not_an_error(store, prefix).await;
    disjoint_concurrent_writes(store, prefix).await;
}

pub async fn put_then_get(store: &dyn SessionStore, prefix: &str) {
    let key = format!("{prefix}-basic");
    store.put(&key, TTL, r#"{"a":1}"#).await.expect("put");
    assert_eq!(
        store.get(&key).await.expect("get").as_deref(),
        Some(r#"{"a":1}"#),
        "[{}] value must round-trip",
        store.backend()
    );
}

pub async fn missing_key_is_none(store: &dyn SessionStore, prefix: &str) {
    let key = format!("{prefix}-never-written");
    assert_eq!(store.get(&key).await.expect("get"), None);
}

pub async fn overwrite_replaces_value(store: &dyn SessionStore, prefix: &str) {
    let key = format!("{prefix}-overwrite");
    store.put(&key, TTL, "first").await.expect("put");
    store.put(&key, TTL, "second").await.expect("put");
    assert_eq!(store.get(&key).await.expect("get").as_deref(), Some("second"));
}

/// Readable strictly before the TTL, unreadable from the TTL on, even
/// though nothing swept the entry.
pub async fn ttl_boundary(store: &dyn SessionStore, clock: &ManualClock, prefix: &str) {
    let key = format!("{prefix}-ttl");
    store.put(&key, TTL, "v").await.expect("put");

    clock.advance(TTL - Duration::from_millis(1));
    assert_eq!(
        store.get(&key).await.expect("get").as_deref(),
        Some("v"),
        "[{}] value must be readable before the TTL",
        store.backend()
    );

    clock.advance(Duration::from_millis(2));
    assert_eq!(
        store.get(&key).await.expect("get"),
        None,
        "[{}] value must be gone after the TTL",
        store.backend()
    );
}

pub async fn overwrite_resets_ttl(store: &dyn SessionStore, clock: &ManualClock, prefix: &str) {
    let key = format!("{prefix}-refresh");
    store.put(&key, TTL, "v1").await.expect("put");
    clock.advance(TTL / 2);
    store.put(&key, TTL, "v2").await.expect("put");
    clock.advance(TTL / 2 + Duration::from_millis(10));
    assert_eq!(store.get(&key).await.expect("get").as_deref(), Some("v2"));
}

pub async fn delete_many_counts_removed(store: &dyn SessionStore, prefix: &str) {
    let a = format!("{prefix}-del-a");
    let b = format!("{prefix}-del-b");
    let ghost = format!("{prefix}-del-ghost");
    store.put(&a, TTL, "a").await.expect("put");
    store.put(&b, TTL, "b").await.expect("put");

    let removed = store
        .delete_many(&[a.clone(), b.clone(), ghost])
        .await
        .expect("delete_many");
    assert_eq!(removed, 2, "[{}] only existing keys count", store.backend());
    assert_eq!(store.get(&a).await.expect("get"), None);
    assert_eq!(store.get(&b).await.expect("get"), None);
}

pub async fn delete_missing_is_not_an_error(store: &dyn SessionStore, prefix: &str) {
    let key = format!("{prefix}-del-missing");
    assert!(!store.delete(&key).await.expect("delete"));
    assert_eq!(store.delete_many(&[]).await.expect("delete_many"), 0);
}

pub async fn disjoint_concurrent_writes(store: &dyn SessionStore, prefix: &str) {
    let keys: Vec<String> = (0..16).map(|i| format!("{prefix}-conc-{i}")).collect();
    let writes = keys.iter().map(|k| store.put(k, TTL, k));
    for result in join_all(writes).await {
        result.expect("concurrent put");
    }
    let reads = join_all(keys.iter().map(|k| store.get(k))).await;
    for (key, read) in keys.iter().zip(reads) {
        assert_eq!(read.expect("get").as_deref(), Some(key.as_str()));
    }
}
