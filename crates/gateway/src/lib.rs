//! `keyward` operator binary: configuration checks, backend diagnostics and
//! credential tooling for the session engine.

pub mod bootstrap;
pub mod cli;
