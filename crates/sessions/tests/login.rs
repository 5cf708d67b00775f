mod common;

use std::time::Duration;

use common::{alice, config, harness, harness_with};
use kw_accounts::AccountRepository;
use kw_domain::account::Account;
use kw_domain::config::LockoutScope;
use kw_domain::error::Error;

#[tokio::test]
async fn password_login_issues_session_on_every_store() {
    let h = harness();
    alice(&h, Some("correct horse")).await;

    let issued = h
        .engine
        .local()
        .login("Alice@Example.com", "correct horse", Some("1.2.3.4"))
        .await
        .unwrap();

    assert_eq!(issued.provider, "local");
    assert_eq!(issued.user_dbs.len(), 2);
    let record = h
        .engine
        .local()
        .authenticate_bearer(&issued.bearer_token())
        .await
        .unwrap();
    assert_eq!(record.user_id, "alice");
}

#[tokio::test]
async fn unknown_account_and_wrong_password_look_alike() {
    let h = harness();
    alice(&h, Some("correct horse")).await;
    let local = h.engine.local();

    let unknown = local.login("mallory", "x", None).await.unwrap_err();
    let wrong = local.login("alice", "x", None).await.unwrap_err();

    assert!(matches!(unknown, Error::InvalidCredential));
    assert!(matches!(wrong, Error::InvalidCredential));
}

#[tokio::test]
async fn repeated_wrong_passwords_lock_the_account() {
    let h = harness();
    alice(&h, Some("correct horse")).await;
    let local = h.engine.local();

    for _ in 0..2 {
        let err = local.login("alice", "nope", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredential));
    }
    let err = local.login("alice", "nope", None).await.unwrap_err();
    assert!(matches!(err, Error::AccountLocked { .. }));

    // Locked even with the right password, until the lockout elapses.
    let err = local.login("alice", "correct horse", None).await.unwrap_err();
    assert!(matches!(err, Error::AccountLocked { .. }));

    h.clock.advance(Duration::from_secs(601));
    local.login("alice", "correct horse", None).await.unwrap();
}

#[tokio::test]
async fn successful_login_resets_the_counter() {
    let h = harness();
    alice(&h, Some("correct horse")).await;
    let local = h.engine.local();

    local.login("alice", "nope", None).await.unwrap_err();
    local.login("alice", "nope", None).await.unwrap_err();
    local.login("alice", "correct horse", None).await.unwrap();

    let account = h.repo.get_account("alice").await.unwrap().value;
    assert_eq!(account.local.unwrap().lockout.failed_login_attempts, 0);
}

#[tokio::test]
async fn wrong_session_secret_never_touches_lockout() {
    let h = harness();
    alice(&h, Some("correct horse")).await;
    let issued = h
        .engine
        .local()
        .login("alice", "correct horse", None)
        .await
        .unwrap();
    let before = h.repo.get_account("alice").await.unwrap();

    for _ in 0..5 {
        let err = h
            .engine
            .local()
            .authenticate_bearer(&format!("{}:wrong", issued.key))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredential));
    }

    let after = h.repo.get_account("alice").await.unwrap();
    assert_eq!(before.revision, after.revision);
    assert_eq!(before.value.local, after.value.local);
}

#[tokio::test]
async fn malformed_bearer_is_rejected() {
    let h = harness();
    let err = h
        .engine
        .local()
        .authenticate_bearer("no-colon-here")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCredential));
}

#[tokio::test]
async fn account_without_password_cannot_log_in() {
    let h = harness();
    alice(&h, None).await;
    let err = h
        .engine
        .local()
        .login("alice", "anything", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCredential));
}

#[tokio::test]
async fn corrupt_stored_credential_is_malformed() {
    let h = harness();
    alice(&h, Some("correct horse")).await;
    let current = h.repo.get_account("alice").await.unwrap();
    let mut account = current.value;
    if let Some(local) = account.local.as_mut() {
        local.salt = None;
    }
    h.repo.put_account(&account, current.revision).await.unwrap();

    let err = h
        .engine
        .local()
        .login("alice", "correct horse", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedCredential(_)));
}

#[tokio::test]
async fn unconfirmed_email_is_refused_when_required() {
    let mut cfg = config();
    cfg.security.require_email_confirm = true;
    let h = harness_with(cfg);
    let mut account = Account::new("bob");
    account.roles = vec!["user".into()];
    h.engine
        .register_account(account, Some("pw-bob"))
        .await
        .unwrap();

    let err = h.engine.local().login("bob", "pw-bob", None).await.unwrap_err();
    assert!(matches!(err, Error::EmailUnconfirmed));
}

#[tokio::test]
async fn address_scoped_lockout_spares_other_addresses() {
    let mut cfg = config();
    cfg.security.lockout_scope = LockoutScope::AccountAndAddress;
    let h = harness_with(cfg);
    alice(&h, Some("correct horse")).await;
    let local = h.engine.local();

    for _ in 0..3 {
        local.login("alice", "nope", Some("10.0.0.1")).await.unwrap_err();
    }
    let err = local
        .login("alice", "correct horse", Some("10.0.0.1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccountLocked { .. }));
    local
        .login("alice", "correct horse", Some("10.0.0.2"))
        .await
        .unwrap();
}

#[tokio::test]
async fn change_password_logs_out_other_sessions() {
    let h = harness();
    alice(&h, Some("old-pw")).await;
    let local = h.engine.local();
    let keep = local.login("alice", "old-pw", None).await.unwrap();
    let other = local.login("alice", "old-pw", None).await.unwrap();

    let err = local
        .change_password("alice", Some("wrong"), "new-pw", Some(&keep.key))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCredential));

    let report = local
        .change_password("alice", Some("old-pw"), "new-pw", Some(&keep.key))
        .await
        .unwrap();
    assert_eq!(report.revoked, vec![other.key.clone()]);

    local.authenticate_bearer(&keep.bearer_token()).await.unwrap();
    let err = local.authenticate_bearer(&other.bearer_token()).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound));
    assert!(local.login("alice", "old-pw", None).await.is_err());
    local.login("alice", "new-pw", None).await.unwrap();
}
