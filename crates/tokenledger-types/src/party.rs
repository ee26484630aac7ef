//! Ledger participants.
//!
//! A [`Party`] is an opaque identity bound to one attestation key. Equality
//! and hashing go through the identity, never the key material, so two
//! `Party` values with the same `id` are the same participant even if one of
//! them was built from a stale directory entry.

use std::fmt;
use std::hash::{Hash, Hasher};

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

use crate::{PartyId, PartyKey};

/// A participant in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    /// Stable identity.
    pub id: PartyId,
    /// Human-readable name, used only for logs.
    pub name: String,
    /// Verifying key this party attests with.
    pub key: PartyKey,
}

impl Party {
    #[must_use]
    pub fn new(id: PartyId, name: impl Into<String>, key: PartyKey) -> Self {
        Self {
            id,
            name: name.into(),
            key,
        }
    }

    /// Build a party whose key is derived from `signing_key`.
    #[must_use]
    pub fn from_signing_key(name: impl Into<String>, signing_key: &SigningKey) -> Self {
        Self::new(
            PartyId::new(),
            name,
            PartyKey(signing_key.verifying_key().to_bytes()),
        )
    }
}

impl PartialEq for Party {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Party {}

impl Hash for Party {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Test party generation. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Party {
    /// Generate a fresh party together with its signing key.
    pub fn generate(name: &str) -> (Self, SigningKey) {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        (Self::from_signing_key(name, &signing_key), signing_key)
    }

    /// A party with a random key and no usable signing key.
    pub fn dummy(name: &str) -> Self {
        Self::generate(name).0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equality_is_by_identity() {
        let a = Party::dummy("alice");
        let mut renamed = a.clone();
        renamed.name = "alice-renamed".into();
        renamed.key = PartyKey([9; 32]);
        assert_eq!(a, renamed);

        let b = Party::dummy("alice");
        assert_ne!(a, b, "same name, different identity");
    }

    #[test]
    fn hash_follows_identity() {
        let a = Party::dummy("alice");
        let mut set = HashSet::new();
        set.insert(a.clone());
        let mut twin = a.clone();
        twin.name = "other".into();
        assert!(set.contains(&twin));
    }

    #[test]
    fn key_matches_signing_key() {
        let (party, sk) = Party::generate("bob");
        assert_eq!(party.key.0, sk.verifying_key().to_bytes());
    }

    #[test]
    fn display_is_name() {
        let p = Party::dummy("carol");
        assert_eq!(p.to_string(), "carol");
    }
}
