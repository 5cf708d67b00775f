//! In-process account repository with real revision checks.

use std::collections::HashMap;

use async_trait::async_trait;
use kw_domain::account::{Account, Revision, Versioned};
use kw_domain::error::{Error, Result};
use parking_lot::RwLock;

use crate::repository::AccountRepository;

/// Account repository backed by a `HashMap`. Each successful write bumps
/// the stored revision by one.
#[derive(Default)]
pub struct MemoryAccountRepository {
    docs: RwLock<HashMap<String, (Account, Revision)>>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn get_account(&self, id: &str) -> Result<Versioned<Account>> {
        self.docs
            .read()
            .get(id)
            .map(|(account, revision)| Versioned {
                value: account.clone(),
                revision: *revision,
            })
            .ok_or_else(|| Error::AccountNotFound(id.to_owned()))
    }

    async fn put_account(&self, account: &Account, expected: Revision) -> Result<Revision> {
        let mut docs = self.docs.write();
        let Some((stored, revision)) = docs.get_mut(&account.id) else {
            return Err(Error::AccountNotFound(account.id.clone()));
        };
        if *revision != expected {
            return Err(Error::RevisionConflict {
                account_id: account.id.clone(),
            });
        }
        *stored = account.clone();
        *revision += 1;
        Ok(*revision)
    }

    async fn find_account_by_login(&self, identifier: &str) -> Result<Option<Versioned<Account>>> {
        let needle = identifier.trim().to_lowercase();
        let docs = self.docs.read();
        let found = docs.values().find(|(account, _)| {
            account.id.to_lowercase() == needle
                || account
                    .email
                    .as_deref()
                    .is_some_and(|e| e.to_lowercase() == needle)
        });
        Ok(found.map(|(account, revision)| Versioned {
            value: account.clone(),
            revision: *revision,
        }))
    }

    async fn create_account(&self, account: &Account) -> Result<Revision> {
        let mut docs = self.docs.write();
        if docs.contains_key(&account.id) {
            return Err(Error::RevisionConflict {
                account_id: account.id.clone(),
            });
        }
        docs.insert(account.id.clone(), (account.clone(), 1));
        Ok(1)
    }

    async fn delete_account(&self, id: &str, expected: Revision) -> Result<()> {
        let mut docs = self.docs.write();
        match docs.get(id) {
            None => Err(Error::AccountNotFound(id.to_owned())),
            Some((_, revision)) if *revision != expected => Err(Error::RevisionConflict {
                account_id: id.to_owned(),
            }),
            Some(_) => {
                docs.remove(id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let repo = MemoryAccountRepository::new();
        let rev = repo.create_account(&Account::new("alice")).await.unwrap();

        let mut account = repo.get_account("alice").await.unwrap().value;
        account.roles.push("admin".into());
        let next = repo.put_account(&account, rev).await.unwrap();
        assert_eq!(next, rev + 1);

        let err = repo.put_account(&account, rev).await.unwrap_err();
        assert!(matches!(err, Error::RevisionConflict { .. }));
    }

    #[tokio::test]
    async fn login_lookup_matches_id_or_email() {
        let repo = MemoryAccountRepository::new();
        let mut account = Account::new("alice");
        account.email = Some("Alice@Example.com".into());
        repo.create_account(&account).await.unwrap();

        assert!(repo.find_account_by_login("ALICE").await.unwrap().is_some());
        assert!(repo
            .find_account_by_login("alice@example.com")
            .await
            .unwrap()
            .is_some());
        assert!(repo.find_account_by_login("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let repo = MemoryAccountRepository::new();
        repo.create_account(&Account::new("alice")).await.unwrap();
        assert!(repo.create_account(&Account::new("alice")).await.is_err());
    }

    #[tokio::test]
    async fn delete_checks_revision() {
        let repo = MemoryAccountRepository::new();
        let rev = repo.create_account(&Account::new("alice")).await.unwrap();
        assert!(repo.delete_account("alice", rev + 5).await.is_err());
        repo.delete_account("alice", rev).await.unwrap();
        assert!(repo.is_empty());
    }
}
