//! `kw-accounts` — the account repository boundary.
//!
//! The account document lives in an external versioned document store. This
//! crate defines the [`AccountRepository`] contract the core consumes, an
//! in-memory implementation with real revision checks, and
//! [`modify_account`], the bounded optimistic read-modify-write loop every
//! account mutation goes through.

pub mod memory;
pub mod modify;
pub mod repository;

pub use memory::MemoryAccountRepository;
pub use modify::{modify_account, RetryPolicy};
pub use repository::AccountRepository;
