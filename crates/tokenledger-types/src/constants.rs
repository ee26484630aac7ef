//! System-wide constants for the TokenLedger core.

/// Default time a proposer waits for one counterparty's attestation.
pub const DEFAULT_ATTESTATION_TIMEOUT_MS: u64 = 30_000;

/// Default time a counterparty waits for the outcome after attesting.
pub const DEFAULT_FINALITY_TIMEOUT_MS: u64 = 120_000;

/// Default time a proposer waits for the sequencer's decision.
pub const DEFAULT_SEQUENCER_TIMEOUT_MS: u64 = 60_000;

/// Domain separator for transaction identifiers.
pub const TX_ID_DOMAIN: &[u8] = b"tokenledger:tx:v1:";

/// Domain separator for attestation signing payloads.
pub const ATTESTATION_DOMAIN: &[u8] = b"tokenledger:attest:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "TokenLedger";
