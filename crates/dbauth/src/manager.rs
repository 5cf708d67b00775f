//! Grants and revokes session keys on personal stores, and provisions or
//! deprovisions those stores on account lifecycle events.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use kw_accounts::{modify_account, AccountRepository, RetryPolicy};
use kw_domain::account::{Account, PersonalStore, SessionSummary, StoreKind};
use kw_domain::config::{SecurityRoles, UserDbsConfig};
use kw_domain::error::{Error, Result};
use kw_domain::io::bounded;
use kw_domain::trace::TraceEvent;
use kw_domain::Clock;

use crate::naming::StoreNamer;
use crate::provisioner::{AccessPolicy, RoleSet, StoreProvisioner};

/// One session key authorized on one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreGrant {
    pub store: String,
    pub key: String,
    pub access_token: String,
}

/// A store addressed both by the name the account knows it under and by its
/// physical name on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTarget {
    pub logical: String,
    pub physical: String,
}

/// A store that could not be reached while revoking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub store: String,
    pub reason: String,
}

/// Resolved configuration for one logical store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub kind: StoreKind,
    pub admin_roles: Vec<String>,
    pub member_roles: Vec<String>,
}

pub struct DbAuthorizationManager {
    provisioner: Arc<dyn StoreProvisioner>,
    accounts: Arc<dyn AccountRepository>,
    config: UserDbsConfig,
    namer: StoreNamer,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl DbAuthorizationManager {
    pub fn new(
        config: UserDbsConfig,
        provisioner: Arc<dyn StoreProvisioner>,
        accounts: Arc<dyn AccountRepository>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let namer = StoreNamer::new(&config.private_prefix, config.public_url.as_deref())?;
        Ok(Self {
            provisioner,
            accounts,
            config,
            namer,
            policy,
            clock,
        })
    }

    pub fn namer(&self) -> &StoreNamer {
        &self.namer
    }

    /// Settings for `logical`: an explicit kind wins over the model entry,
    /// roles come from the model entry or the configured defaults.
    pub fn store_config(&self, logical: &str, requested: Option<StoreKind>) -> StoreSettings {
        let model = self.config.model.get(logical);
        let defaults = &self.config.default_security_roles;
        StoreSettings {
            kind: requested
                .or_else(|| model.and_then(|m| m.kind))
                .unwrap_or_default(),
            admin_roles: model
                .and_then(|m| m.admin_roles.clone())
                .unwrap_or_else(|| defaults.admins.clone()),
            member_roles: model
                .and_then(|m| m.member_roles.clone())
                .unwrap_or_else(|| defaults.members.clone()),
        }
    }

    /// Map caller-supplied store names onto the account's store map. A name
    /// may be a logical name or a physical one; unknown names are used as is.
    pub fn resolve_targets(account: &Account, names: &[String]) -> Vec<StoreTarget> {
        let mut targets: Vec<StoreTarget> = Vec::with_capacity(names.len());
        for name in names {
            let target = if let Some(store) = account.personal_dbs.get(name) {
                StoreTarget {
                    logical: name.clone(),
                    physical: store.name.clone(),
                }
            } else if let Some((logical, store)) =
                account.personal_dbs.iter().find(|(_, s)| &s.name == name)
            {
                StoreTarget {
                    logical: logical.clone(),
                    physical: store.name.clone(),
                }
            } else {
                StoreTarget {
                    logical: name.clone(),
                    physical: name.clone(),
                }
            };
            if !targets.iter().any(|t| t.physical == target.physical) {
                targets.push(target);
            }
        }
        targets
    }

    /// Authorize `key` on `store`. Re-granting the same key is a no-op
    /// replace on the server.
    pub async fn grant(&self, key: &str, store: &str, roles: &[String]) -> Result<StoreGrant> {
        bounded(
            self.policy.io_timeout,
            "authorize key",
            self.provisioner.authorize_key(store, key, roles),
        )
        .await
        .map_err(|e| unavailable(store, e))?;
        tracing::debug!(key, store, "key authorized");
        Ok(StoreGrant {
            store: store.to_owned(),
            key: key.to_owned(),
            access_token: self.namer.access_token(store),
        })
    }

    /// Authorize `key` on every target, or on none.
    ///
    /// Grants run concurrently. If any fails, the grants that succeeded are
    /// revoked (best-effort) and `AuthorizationPropagationFailed` names the
    /// first failing store. Returns logical name → access token.
    pub async fn grant_all(
        &self,
        key: &str,
        targets: &[StoreTarget],
        roles: &[String],
    ) -> Result<BTreeMap<String, String>> {
        let futs = targets.iter().map(|t| async move {
            let result = self.grant(key, &t.physical, roles).await;
            (t, result)
        });
        let results = join_all(futs).await;

        let mut tokens = BTreeMap::new();
        let mut granted = Vec::new();
        let mut failure: Option<(String, Error)> = None;
        for (target, result) in results {
            match result {
                Ok(grant) => {
                    granted.push(grant.store);
                    tokens.insert(target.logical.clone(), grant.access_token);
                }
                Err(e) => {
                    tracing::warn!(key, store = %target.physical, error = %e, "grant failed");
                    if failure.is_none() {
                        failure = Some((target.physical.clone(), e));
                    }
                }
            }
        }

        let Some((store, err)) = failure else {
            return Ok(tokens);
        };
        let rolled_back = self.roll_back(key, &granted).await;
        TraceEvent::GrantRollback {
            key: key.to_owned(),
            failed_store: store.clone(),
            rolled_back,
        }
        .emit();
        Err(Error::AuthorizationPropagationFailed {
            store,
            reason: err.to_string(),
        })
    }

    async fn roll_back(&self, key: &str, stores: &[String]) -> usize {
        let keys = [key.to_owned()];
        let failures = self.revoke_everywhere(stores, &keys).await;
        for f in &failures {
            TraceEvent::GrantOrphaned {
                store: f.store.clone(),
                key: key.to_owned(),
                reason: f.reason.clone(),
            }
            .emit();
        }
        stores.len() - failures.len()
    }

    /// Deauthorize `keys` on `store`. Unknown keys are ignored.
    pub async fn revoke(&self, store: &str, keys: &[String]) -> Result<()> {
        for key in keys {
            bounded(
                self.policy.io_timeout,
                "deauthorize key",
                self.provisioner.deauthorize_key(store, key),
            )
            .await
            .map_err(|e| unavailable(store, e))?;
        }
        Ok(())
    }

    /// Deauthorize `keys` on every store concurrently, collecting the stores
    /// that could not be reached instead of stopping at the first.
    pub async fn revoke_everywhere(&self, stores: &[String], keys: &[String]) -> Vec<StoreFailure> {
        let futs = stores.iter().map(|store| async move {
            self.revoke(store, keys)
                .await
                .err()
                .map(|e| StoreFailure {
                    store: store.clone(),
                    reason: e.to_string(),
                })
        });
        join_all(futs).await.into_iter().flatten().collect()
    }

    /// Create `logical` for the account if absent, apply its access policy,
    /// record it in the account's store map, and authorize every live
    /// session of the account on it. Safe to repeat.
    pub async fn provision_store(
        &self,
        account_id: &str,
        logical: &str,
        kind: Option<StoreKind>,
        roles: Option<&SecurityRoles>,
    ) -> Result<PersonalStore> {
        bounded(
            self.policy.io_timeout,
            "account read",
            self.accounts.get_account(account_id),
        )
        .await?;

        let mut settings = self.store_config(logical, kind);
        if let Some(roles) = roles {
            settings.admin_roles = roles.admins.clone();
            settings.member_roles = roles.members.clone();
        }
        let physical = self.namer.physical_name(account_id, logical, settings.kind)?;

        let created = bounded(
            self.policy.io_timeout,
            "create store",
            self.provisioner.create_store(&physical),
        )
        .await
        .map_err(|e| unavailable(&physical, e))?;

        let access = AccessPolicy {
            admins: RoleSet {
                names: Vec::new(),
                roles: settings.admin_roles.clone(),
            },
            members: RoleSet {
                names: match settings.kind {
                    StoreKind::Private => vec![account_id.to_owned()],
                    StoreKind::Shared => Vec::new(),
                },
                roles: settings.member_roles.clone(),
            },
        };
        bounded(
            self.policy.io_timeout,
            "set access policy",
            self.provisioner.set_store_access_policy(&physical, &access),
        )
        .await
        .map_err(|e| unavailable(&physical, e))?;

        let entry = PersonalStore {
            name: physical.clone(),
            kind: settings.kind,
        };
        let (_, account) = modify_account(self.accounts.as_ref(), account_id, &self.policy, |a| {
            a.personal_dbs.insert(logical.to_owned(), entry.clone());
            Ok(())
        })
        .await?;

        // Sessions issued after this write see the store in the map and
        // grant themselves; everything already live is granted here.
        let live: Vec<(&String, &SessionSummary)> =
            account.value.live_sessions(self.clock.now_ms()).collect();
        let futs = live
            .iter()
            .map(|(key, summary)| self.grant(key, &physical, &summary.roles));
        let failures: Vec<Error> = join_all(futs)
            .await
            .into_iter()
            .filter_map(|r| r.err())
            .collect();
        if let Some(err) = failures.into_iter().next() {
            return Err(Error::AuthorizationPropagationFailed {
                store: physical,
                reason: err.to_string(),
            });
        }

        tracing::info!(account_id, store = %physical, created, "store provisioned");
        TraceEvent::StoreProvisioned {
            user_id: account_id.to_owned(),
            store: physical,
            kind: settings.kind.to_string(),
            sessions_granted: live.len(),
        }
        .emit();
        Ok(entry)
    }

    /// Provision every configured default store for a new account.
    pub async fn provision_defaults(&self, account_id: &str) -> Result<Vec<PersonalStore>> {
        let defaults = self.config.default_dbs.clone();
        let wanted = defaults
            .private
            .iter()
            .map(|n| (n, StoreKind::Private))
            .chain(defaults.shared.iter().map(|n| (n, StoreKind::Shared)));

        let mut stores = Vec::new();
        for (name, kind) in wanted {
            stores.push(self.provision_store(account_id, name, Some(kind), None).await?);
        }
        Ok(stores)
    }

    /// Remove `logical` from the account: deauthorize every session on it,
    /// drop it from the store map, and, for private stores when
    /// `destroy_data` is set, destroy the data. Returns `false` if the
    /// account had no such store.
    ///
    /// Failing to deauthorize aborts before the map changes; failing to
    /// destroy is logged and ignored.
    pub async fn deprovision_store(
        &self,
        account_id: &str,
        logical: &str,
        destroy_data: bool,
    ) -> Result<bool> {
        let current = bounded(
            self.policy.io_timeout,
            "account read",
            self.accounts.get_account(account_id),
        )
        .await?;
        let Some(entry) = current.value.personal_dbs.get(logical).cloned() else {
            return Ok(false);
        };

        let keys = current.value.session_keys();
        self.revoke(&entry.name, &keys).await?;

        let (_, after) = modify_account(self.accounts.as_ref(), account_id, &self.policy, |a| {
            a.personal_dbs.remove(logical);
            Ok(())
        })
        .await?;

        // Sessions that appeared between the read and the write.
        let late: Vec<String> = after
            .value
            .session_keys()
            .into_iter()
            .filter(|k| !keys.contains(k))
            .collect();
        self.revoke(&entry.name, &late).await?;

        let mut destroyed = false;
        if destroy_data && entry.kind == StoreKind::Private {
            match bounded(
                self.policy.io_timeout,
                "destroy store",
                self.provisioner.destroy_store(&entry.name),
            )
            .await
            {
                Ok(()) => destroyed = true,
                Err(e) => {
                    tracing::warn!(account_id, store = %entry.name, error = %e, "store destruction failed")
                }
            }
        }

        TraceEvent::StoreDeprovisioned {
            user_id: account_id.to_owned(),
            store: entry.name,
            destroyed,
        }
        .emit();
        Ok(true)
    }

    /// Deprovision every store of the account. All stores are attempted;
    /// the first failure is returned after the rest have been tried.
    pub async fn deprovision_all(&self, account_id: &str, destroy_data: bool) -> Result<usize> {
        let current = bounded(
            self.policy.io_timeout,
            "account read",
            self.accounts.get_account(account_id),
        )
        .await?;

        let mut removed = 0;
        let mut first_err = None;
        for logical in current.value.personal_dbs.keys() {
            match self.deprovision_store(account_id, logical, destroy_data).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(account_id, store = %logical, error = %e, "deprovision failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }
}

fn unavailable(store: &str, err: Error) -> Error {
    match err {
        Error::StoreUnavailable { .. } => err,
        other => Error::StoreUnavailable {
            store: store.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_with_stores() -> Account {
        let mut account = Account::new("alice");
        account.personal_dbs.insert(
            "notes".into(),
            PersonalStore {
                name: "userdb_notes$alice".into(),
                kind: StoreKind::Private,
            },
        );
        account
    }

    #[test]
    fn targets_resolve_logical_physical_and_unknown_names() {
        let account = account_with_stores();
        let names = vec![
            "notes".to_string(),
            "userdb_notes$alice".to_string(),
            "team".to_string(),
        ];
        let targets = DbAuthorizationManager::resolve_targets(&account, &names);
        assert_eq!(
            targets,
            vec![
                StoreTarget {
                    logical: "notes".into(),
                    physical: "userdb_notes$alice".into()
                },
                StoreTarget {
                    logical: "team".into(),
                    physical: "team".into()
                },
            ]
        );
    }

    #[test]
    fn non_unavailable_errors_are_wrapped() {
        let err = unavailable("s", Error::Timeout("x".into()));
        assert!(matches!(err, Error::StoreUnavailable { store, .. } if store == "s"));
    }
}
