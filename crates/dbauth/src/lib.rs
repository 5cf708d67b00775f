//! `kw-dbauth` — per-account data-store provisioning and session-key
//! authorization.
//!
//! [`DbAuthorizationManager`] keeps every live session key authorized on
//! every personal store of its account. It talks to the data-store server
//! through the [`StoreProvisioner`] trait; [`MemoryProvisioner`] is the
//! in-process implementation used by tests and single-node setups.

pub mod manager;
pub mod memory;
pub mod naming;
pub mod provisioner;

pub use manager::{DbAuthorizationManager, StoreFailure, StoreGrant, StoreSettings, StoreTarget};
pub use memory::MemoryProvisioner;
pub use naming::StoreNamer;
pub use provisioner::{AccessPolicy, RoleSet, StoreProvisioner};
