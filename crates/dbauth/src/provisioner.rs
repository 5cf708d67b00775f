use async_trait::async_trait;
use kw_domain::error::Result;
use serde::{Deserialize, Serialize};

/// Names and roles allowed one access level on a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Store-level security document: who administers and who may use a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub admins: RoleSet,
    pub members: RoleSet,
}

/// The data-store server's provisioning surface.
///
/// Implementations must treat `deauthorize_key` of an unknown key as
/// success, and `authorize_key` of an already-authorized key as a replace.
#[async_trait]
pub trait StoreProvisioner: Send + Sync {
    /// Create a store. Returns `false` if it already existed.
    async fn create_store(&self, name: &str) -> Result<bool>;

    /// Destroy a store and its data. Missing stores are not an error.
    async fn destroy_store(&self, name: &str) -> Result<()>;

    async fn set_store_access_policy(&self, name: &str, policy: &AccessPolicy) -> Result<()>;

    async fn authorize_key(&self, store: &str, key: &str, roles: &[String]) -> Result<()>;

    async fn deauthorize_key(&self, store: &str, key: &str) -> Result<()>;
}
