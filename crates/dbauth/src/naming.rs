//! Physical store names and access tokens.

use kw_domain::account::StoreKind;
use kw_domain::error::{Error, Result};
use regex::Regex;

/// Names a store must match on the data-store server: a lowercase letter
/// followed by lowercase letters, digits, or any of `_$()+-/`.
const LEGAL_NAME: &str = r"^[a-z][a-z0-9_$()+/-]*$";

/// Turns logical store names into legal physical names.
#[derive(Debug, Clone)]
pub struct StoreNamer {
    private_prefix: String,
    public_url: Option<String>,
    legal: Regex,
}

impl StoreNamer {
    pub fn new(private_prefix: &str, public_url: Option<&str>) -> Result<Self> {
        let legal = Regex::new(LEGAL_NAME).map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self {
            private_prefix: private_prefix.to_owned(),
            public_url: public_url
                .map(|u| u.trim_end_matches('/').to_owned())
                .filter(|u| !u.is_empty()),
            legal,
        })
    }

    /// `<prefix>_<logical>$<account>` for private stores, the logical name
    /// for shared ones; both made legal.
    pub fn physical_name(&self, account_id: &str, logical: &str, kind: StoreKind) -> Result<String> {
        let raw = match kind {
            StoreKind::Private => format!("{}_{}${}", self.private_prefix, logical, account_id),
            StoreKind::Shared => logical.to_owned(),
        };
        self.legalize(&raw)
    }

    /// Lowercase, replace illegal characters with `_`, and check the result.
    pub fn legalize(&self, raw: &str) -> Result<String> {
        let mut name: String = raw
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'a'..='z' | '0'..='9' | '_' | '$' | '(' | ')' | '+' | '-' | '/' => c,
                _ => '_',
            })
            .collect();
        if name.starts_with(|c: char| !c.is_ascii_lowercase()) {
            name.insert(0, 'x');
        }
        if self.legal.is_match(&name) {
            Ok(name)
        } else {
            Err(Error::Config(format!("cannot derive a legal store name from {raw:?}")))
        }
    }

    /// Token a session presents to reach `store`.
    pub fn access_token(&self, store: &str) -> String {
        match &self.public_url {
            Some(base) => format!("{base}/{store}"),
            None => store.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namer() -> StoreNamer {
        StoreNamer::new("userdb", Some("https://db.example.com/")).unwrap()
    }

    #[test]
    fn private_names_carry_prefix_and_owner() {
        let n = namer();
        assert_eq!(
            n.physical_name("Alice", "notes", StoreKind::Private).unwrap(),
            "userdb_notes$alice"
        );
        assert_eq!(
            n.physical_name("alice", "team", StoreKind::Shared).unwrap(),
            "team"
        );
    }

    #[test]
    fn illegal_characters_are_replaced() {
        let n = namer();
        assert_eq!(
            n.physical_name("bob.smith@x.io", "main", StoreKind::Private).unwrap(),
            "userdb_main$bob_smith_x_io"
        );
        assert_eq!(n.legalize("9lives").unwrap(), "x9lives");
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(namer().legalize("").is_err());
    }

    #[test]
    fn tokens_use_public_url_when_set() {
        assert_eq!(namer().access_token("team"), "https://db.example.com/team");
        let bare = StoreNamer::new("userdb", None).unwrap();
        assert_eq!(bare.access_token("team"), "team");
    }
}
