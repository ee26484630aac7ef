//! Attestations: a party's ed25519 signature over a transaction ID.
//!
//! A [`SignedTransaction`] carries the proposal plus every attestation
//! collected so far. It is complete once every key in `tx.attestors` has a
//! valid attestation.

use std::collections::BTreeSet;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{LedgerError, PartyKey, Result, Transaction, TransactionId, constants};

/// One party's signature over a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// The attesting key.
    pub by: PartyKey,
    /// Ed25519 signature over [`Attestation::signing_payload`].
    pub signature: Vec<u8>,
}

impl Attestation {
    /// Canonical signing payload: `"tokenledger:attest:v1:" || tx_id`.
    #[must_use]
    pub fn signing_payload(tx_id: &TransactionId) -> Vec<u8> {
        let mut payload = Vec::with_capacity(constants::ATTESTATION_DOMAIN.len() + 32);
        payload.extend_from_slice(constants::ATTESTATION_DOMAIN);
        payload.extend_from_slice(tx_id.as_bytes());
        payload
    }

    /// Sign `tx_id` with `signing_key`.
    #[must_use]
    pub fn sign(tx_id: &TransactionId, signing_key: &SigningKey) -> Self {
        let signature = signing_key.sign(&Self::signing_payload(tx_id));
        Self {
            by: PartyKey(signing_key.verifying_key().to_bytes()),
            signature: signature.to_bytes().to_vec(),
        }
    }

    /// Check the signature against `tx_id`.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidAttestation`] if the key or signature
    /// is malformed or the signature does not verify.
    pub fn verify(&self, tx_id: &TransactionId) -> Result<()> {
        let invalid = |reason: &str| LedgerError::InvalidAttestation {
            key: self.by,
            reason: reason.to_string(),
        };
        let key = VerifyingKey::from_bytes(self.by.as_bytes())
            .map_err(|_| invalid("malformed verifying key"))?;
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| invalid("malformed signature"))?;
        key.verify(&Self::signing_payload(tx_id), &signature)
            .map_err(|_| invalid("signature does not verify"))
    }
}

/// A transaction plus the attestations collected for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub attestations: Vec<Attestation>,
}

impl SignedTransaction {
    /// Wrap an unattested transaction.
    #[must_use]
    pub fn new(tx: Transaction) -> Self {
        Self {
            tx,
            attestations: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.tx.id
    }

    /// Add an attestation after checking it.
    ///
    /// A second attestation by the same key is ignored.
    ///
    /// # Errors
    /// - [`LedgerError::UnexpectedAttestor`] if the key is not a declared attestor
    /// - [`LedgerError::InvalidAttestation`] if the signature does not verify
    pub fn add_attestation(&mut self, attestation: Attestation) -> Result<()> {
        if !self.tx.attestors.contains(&attestation.by) {
            return Err(LedgerError::UnexpectedAttestor(attestation.by));
        }
        attestation.verify(&self.tx.id)?;
        if self.attestations.iter().all(|a| a.by != attestation.by) {
            self.attestations.push(attestation);
        }
        Ok(())
    }

    /// Keys that have attested.
    #[must_use]
    pub fn attested_keys(&self) -> BTreeSet<PartyKey> {
        self.attestations.iter().map(|a| a.by).collect()
    }

    /// Declared attestors that have not attested yet.
    #[must_use]
    pub fn missing_attestors(&self) -> BTreeSet<PartyKey> {
        let attested = self.attested_keys();
        self.tx.attestors.difference(&attested).copied().collect()
    }

    #[must_use]
    pub fn is_fully_attested(&self) -> bool {
        self.missing_attestors().is_empty()
    }

    /// Verify that every attestation is valid and every declared attestor
    /// has attested.
    ///
    /// # Errors
    /// Returns the first invalid attestation, or
    /// [`LedgerError::MissingAttestation`] naming the first missing key.
    pub fn verify_attestations(&self) -> Result<()> {
        for attestation in &self.attestations {
            if !self.tx.attestors.contains(&attestation.by) {
                return Err(LedgerError::UnexpectedAttestor(attestation.by));
            }
            attestation.verify(&self.tx.id)?;
        }
        match self.missing_attestors().into_iter().next() {
            Some(key) => Err(LedgerError::MissingAttestation(key)),
            None => Ok(()),
        }
    }
}
