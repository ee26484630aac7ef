//! Attestation collaborator.

use ed25519_dalek::SigningKey;
use tokenledger_types::{Attestation, LedgerError, Party, PartyKey, Result, TransactionId};

/// Produces this party's attestations.
pub trait Signer: Send + Sync {
    fn party(&self) -> &Party;

    fn attest(&self, tx_id: &TransactionId) -> Attestation;
}

/// Signs with an in-memory ed25519 key.
pub struct KeyPairSigner {
    party: Party,
    key: SigningKey,
}

impl KeyPairSigner {
    /// Pair `party` with its signing key.
    ///
    /// # Errors
    /// Returns `Configuration` if the key is not the one `party` attests with.
    pub fn new(party: Party, key: SigningKey) -> Result<Self> {
        let derived = PartyKey(key.verifying_key().to_bytes());
        if derived != party.key {
            return Err(LedgerError::Configuration(format!(
                "signing key {derived} does not belong to {party} ({})",
                party.key
            )));
        }
        Ok(Self { party, key })
    }
}

/// Fresh identities for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl KeyPairSigner {
    /// A new party with a random key. The returned key can build further
    /// signers for the same party.
    pub fn generate(name: &str) -> (Self, SigningKey) {
        let (party, key) = Party::generate(name);
        let signer = Self {
            party,
            key: key.clone(),
        };
        (signer, key)
    }
}

impl Signer for KeyPairSigner {
    fn party(&self) -> &Party {
        &self.party
    }

    fn attest(&self, tx_id: &TransactionId) -> Attestation {
        Attestation::sign(tx_id, &self.key)
    }
}
