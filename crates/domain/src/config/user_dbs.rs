use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::account::StoreKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Personal stores
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDbsConfig {
    /// Prefix for private store names: `<prefix>_<name>$<account>`.
    #[serde(default = "d_private_prefix")]
    pub private_prefix: String,

    /// Base URL prepended to store names to form access tokens.
    #[serde(default)]
    pub public_url: Option<String>,

    /// Stores every new account gets.
    #[serde(default)]
    pub default_dbs: DefaultDbs,

    /// Security roles applied when a store has no model entry.
    #[serde(default)]
    pub default_security_roles: SecurityRoles,

    /// Per-store overrides keyed by logical store name.
    #[serde(default)]
    pub model: HashMap<String, StoreModel>,
}

impl Default for UserDbsConfig {
    fn default() -> Self {
        Self {
            private_prefix: d_private_prefix(),
            public_url: None,
            default_dbs: DefaultDbs::default(),
            default_security_roles: SecurityRoles::default(),
            model: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultDbs {
    #[serde(default)]
    pub private: Vec<String>,
    #[serde(default)]
    pub shared: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRoles {
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreModel {
    #[serde(default, rename = "type")]
    pub kind: Option<StoreKind>,
    #[serde(default)]
    pub admin_roles: Option<Vec<String>>,
    #[serde(default)]
    pub member_roles: Option<Vec<String>>,
}

fn d_private_prefix() -> String {
    "userdb".into()
}
