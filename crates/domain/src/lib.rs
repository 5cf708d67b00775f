//! Shared types for the keyward workspace: the error taxonomy, the
//! configuration tree, structured trace events, the injectable clock and
//! the account/session data model.

pub mod account;
pub mod clock;
pub mod config;
pub mod error;
pub mod io;
pub mod session;
pub mod trace;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
