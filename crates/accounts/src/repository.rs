use async_trait::async_trait;
use kw_domain::account::{Account, Revision, Versioned};
use kw_domain::error::Result;

/// Versioned document store holding account records.
///
/// Writes are conditioned on the revision the caller read; a mismatch is
/// reported as `Error::RevisionConflict` and the caller re-reads.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fetch an account and its current revision.
    /// `Error::AccountNotFound` when absent.
    async fn get_account(&self, id: &str) -> Result<Versioned<Account>>;

    /// Replace the account if its revision is still `expected`.
    async fn put_account(&self, account: &Account, expected: Revision) -> Result<Revision>;

    /// Look an account up by login identifier (id or email, case-insensitive).
    async fn find_account_by_login(&self, identifier: &str) -> Result<Option<Versioned<Account>>>;

    /// Insert a new account. `Error::RevisionConflict` if the id is taken.
    async fn create_account(&self, account: &Account) -> Result<Revision>;

    /// Remove the account if its revision is still `expected`.
    async fn delete_account(&self, id: &str, expected: Revision) -> Result<()>;
}
