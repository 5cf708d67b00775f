use kw_domain::account::StoreKind;
use kw_domain::config::{Config, LockoutScope, SessionAdapter};

#[test]
fn default_adapter_is_memory() {
    let config = Config::default();
    assert_eq!(config.session_store.adapter, SessionAdapter::Memory);
}

#[test]
fn default_security_matches_documented_values() {
    let config = Config::default();
    assert_eq!(config.security.max_failed_logins, 3);
    assert_eq!(config.security.lockout_time_secs, 600);
    assert_eq!(config.security.session_life_secs, 86_400);
    assert_eq!(config.security.default_roles, vec!["user".to_string()]);
    assert_eq!(config.security.lockout_scope, LockoutScope::Account);
}

#[test]
fn empty_file_parses_to_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.concurrency.max_update_attempts, 5);
    assert_eq!(config.user_dbs.private_prefix, "userdb");
}

#[test]
fn file_adapter_parses() {
    let toml_str = r#"
[session_store]
adapter = "file"

[session_store.file]
sessions_root = "/var/lib/keyward/sessions"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.session_store.adapter, SessionAdapter::File);
    assert_eq!(
        config.session_store.file.sessions_root.to_str(),
        Some("/var/lib/keyward/sessions")
    );
}

#[test]
fn remote_adapter_parses_with_defaults() {
    let toml_str = r#"
[session_store]
adapter = "remote"

[session_store.remote]
url = "https://cache.internal"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.session_store.remote.url, "https://cache.internal");
    assert_eq!(config.session_store.remote.token_env, "KW_CACHE_TOKEN");
    assert_eq!(config.session_store.remote.key_prefix, "kw:session:");
    assert!(config.validate().is_empty());
}

#[test]
fn lockout_scope_per_address_parses() {
    let toml_str = r#"
[security]
lockout_scope = "account_and_address"
max_failed_logins = 5
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.security.lockout_scope, LockoutScope::AccountAndAddress);
    assert_eq!(config.security.max_failed_logins, 5);
}

#[test]
fn store_model_parses() {
    let toml_str = r#"
[user_dbs]
public_url = "https://db.example.com"

[user_dbs.default_dbs]
private = ["notes"]
shared = ["team"]

[user_dbs.model.team]
type = "shared"
admin_roles = ["admin"]
member_roles = ["user"]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let team = &config.user_dbs.model["team"];
    assert_eq!(team.kind, Some(StoreKind::Shared));
    assert_eq!(team.admin_roles.as_deref(), Some(&["admin".to_string()][..]));
    assert_eq!(config.user_dbs.default_dbs.private, vec!["notes".to_string()]);
}
