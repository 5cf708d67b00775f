//! `keyward hash-password` — derive a credential block for seeding accounts.

use kw_domain::config::Config;
use kw_sessions::{CredentialHasher, DerivedCredential};

/// Prompt for a password (twice) without echo and derive its credential.
pub async fn run(config: &Config, iterations: Option<u32>) -> anyhow::Result<()> {
    let first = rpassword::prompt_password_stderr("Password: ")?;
    let second = rpassword::prompt_password_stderr("Confirm password: ")?;
    if first != second {
        anyhow::bail!("passwords do not match");
    }
    if first.is_empty() {
        anyhow::bail!("password must not be empty");
    }

    let derived = derive(config, iterations, &first).await?;
    println!("{}", serde_json::to_string_pretty(&derived)?);
    Ok(())
}

pub async fn derive(
    config: &Config,
    iterations: Option<u32>,
    password: &str,
) -> anyhow::Result<DerivedCredential> {
    let hasher = CredentialHasher::new(iterations.unwrap_or(config.security.hash_iterations));
    Ok(hasher.derive(password).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn iteration_override_is_recorded() {
        let derived = derive(&Config::default(), Some(1500), "pw").await.unwrap();
        assert_eq!(derived.iterations, 1500);
        let hasher = CredentialHasher::new(1500);
        assert!(hasher
            .verify(
                "pw",
                Some(&derived.salt),
                Some(&derived.derived_key),
                Some(derived.iterations)
            )
            .await
            .unwrap());
    }
}
