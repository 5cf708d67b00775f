//! Salted, iterated password digests (PBKDF2-HMAC-SHA256).

use kw_domain::error::{Error, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

const SALT_BYTES: usize = 16;
const DIGEST_BYTES: usize = 32;

/// A derived credential. The iteration count is captured so a later change
/// to the configured cost does not invalidate existing digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedCredential {
    pub salt: String,
    pub iterations: u32,
    pub derived_key: String,
}

#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    iterations: u32,
}

impl CredentialHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Derive a digest of `plaintext` under a fresh random salt. Runs on the
    /// blocking pool.
    pub async fn derive(&self, plaintext: &str) -> Result<DerivedCredential> {
        let hasher = *self;
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || hasher.derive_blocking(&plaintext))
            .await
            .map_err(|e| Error::Other(format!("hash task failed: {e}")))
    }

    pub fn derive_blocking(&self, plaintext: &str) -> DerivedCredential {
        let mut salt = [0u8; SALT_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let salt = hex::encode(salt);
        let digest = pbkdf2_hex(plaintext, &salt, self.iterations);
        DerivedCredential {
            salt,
            iterations: self.iterations,
            derived_key: digest,
        }
    }

    /// Check `plaintext` against a stored digest in constant time.
    ///
    /// A missing salt or digest is `MalformedCredential`. Anything else that
    /// cannot match (undecodable digest, zero iterations) is `Ok(false)`.
    /// Records without an iteration count use the configured one.
    pub async fn verify(
        &self,
        plaintext: &str,
        salt: Option<&str>,
        derived_key: Option<&str>,
        iterations: Option<u32>,
    ) -> Result<bool> {
        let salt = salt
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::MalformedCredential("missing salt".into()))?
            .to_owned();
        let expected = derived_key
            .filter(|d| !d.is_empty())
            .ok_or_else(|| Error::MalformedCredential("missing derived key".into()))?;
        let Ok(expected) = hex::decode(expected) else {
            return Ok(false);
        };
        let iterations = iterations.unwrap_or(self.iterations);
        if iterations == 0 {
            return Ok(false);
        }

        let plaintext = plaintext.to_owned();
        let computed = tokio::task::spawn_blocking(move || pbkdf2_raw(&plaintext, &salt, iterations))
            .await
            .map_err(|e| Error::Other(format!("hash task failed: {e}")))?;
        Ok(bool::from(computed.as_slice().ct_eq(expected.as_slice())))
    }
}

fn pbkdf2_raw(plaintext: &str, salt: &str, iterations: u32) -> [u8; DIGEST_BYTES] {
    let mut out = [0u8; DIGEST_BYTES];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(plaintext.as_bytes(), salt.as_bytes(), iterations, &mut out);
    out
}

fn pbkdf2_hex(plaintext: &str, salt: &str, iterations: u32) -> String {
    hex::encode(pbkdf2_raw(plaintext, salt, iterations))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(1000)
    }

    #[tokio::test]
    async fn derive_then_verify() {
        let h = hasher();
        let c = h.derive("hunter2").await.unwrap();
        assert_eq!(c.salt.len(), SALT_BYTES * 2);
        assert_eq!(c.derived_key.len(), DIGEST_BYTES * 2);
        assert!(h
            .verify("hunter2", Some(&c.salt), Some(&c.derived_key), Some(c.iterations))
            .await
            .unwrap());
        assert!(!h
            .verify("hunter3", Some(&c.salt), Some(&c.derived_key), Some(c.iterations))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn salts_differ_per_derivation() {
        let h = hasher();
        let a = h.derive("same").await.unwrap();
        let b = h.derive("same").await.unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.derived_key, b.derived_key);
    }

    #[tokio::test]
    async fn recorded_iterations_win_over_configured() {
        let old = CredentialHasher::new(1000).derive("pw").await.unwrap();
        let newer = CredentialHasher::new(5000);
        assert!(newer
            .verify("pw", Some(&old.salt), Some(&old.derived_key), Some(old.iterations))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn missing_parts_are_malformed() {
        let h = hasher();
        let err = h.verify("pw", None, Some("aa"), None).await.unwrap_err();
        assert!(matches!(err, Error::MalformedCredential(_)));
        let err = h.verify("pw", Some("aa"), None, None).await.unwrap_err();
        assert!(matches!(err, Error::MalformedCredential(_)));
    }

    #[tokio::test]
    async fn garbage_digest_fails_closed() {
        let h = hasher();
        assert!(!h.verify("pw", Some("aa"), Some("zz-not-hex"), None).await.unwrap());
        assert!(!h.verify("pw", Some("aa"), Some("abcd"), Some(0)).await.unwrap());
        assert!(!h.verify("pw", Some("aa"), Some("abcd"), None).await.unwrap());
    }
}
