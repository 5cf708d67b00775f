//! `kw-sessions` — the session and access-authorization engine.
//!
//! - [`SessionManager`]: issue, confirm, refresh, enumerate and revoke
//!   sessions, keeping store grants in step.
//! - [`LockoutGuard`]: failed-login counting and temporary lockout.
//! - [`CredentialHasher`]: PBKDF2 digests for passwords and session secrets.
//! - [`LocalAuthenticator`]: password login and bearer tokens.
//! - [`Engine`]: all of the above over one [`Config`](kw_domain::config::Config).

pub mod engine;
pub mod hasher;
pub mod keys;
pub mod lockout;
pub mod login;
pub mod manager;

pub use engine::Engine;
pub use hasher::{CredentialHasher, DerivedCredential};
pub use keys::{generate_key, generate_secret, parse_bearer};
pub use lockout::{FailedAttempt, LockoutGuard};
pub use login::{LocalAuthenticator, LOCAL_PROVIDER};
pub use manager::{RevokeFailure, RevokeReport, SessionManager};
