//! Session key and secret generation.

use kw_domain::error::{Error, Result};
use rand::RngCore;

const KEY_BYTES: usize = 16;
const SECRET_BYTES: usize = 24;

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A fresh public session key. Hex, so it is a legal key for every
/// session-store backend.
pub fn generate_key() -> String {
    random_hex(KEY_BYTES)
}

/// A fresh plaintext session secret.
pub fn generate_secret() -> String {
    random_hex(SECRET_BYTES)
}

/// Split a `key:secret` bearer token.
pub fn parse_bearer(token: &str) -> Result<(&str, &str)> {
    match token.trim().split_once(':') {
        Some((key, secret)) if !key.is_empty() && !secret.is_empty() => Ok((key, secret)),
        _ => Err(Error::InvalidCredential),
    }
}
