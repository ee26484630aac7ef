//! Configuration for a ledger participant's flows.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{LedgerError, Result, constants};

/// How a builder picks one live record when several are eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Smallest eligible quantity; ties go to the earliest recorded.
    #[default]
    SmallestSufficient,
    /// First eligible record in the store's recording order.
    FirstRecorded,
}

/// Per-participant protocol configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// How long the proposer waits for each counterparty's attestation.
    pub attestation_timeout_ms: u64,
    /// How long a counterparty waits for the outcome once engaged.
    pub finality_timeout_ms: u64,
    /// How long the proposer waits for the sequencer's decision.
    pub sequencer_timeout_ms: u64,
    /// Record selection for Move.
    pub selection: SelectionPolicy,
    /// Send the issuer a best-effort copy of finalized moves it did not take part in.
    pub forward_supply_copy: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            attestation_timeout_ms: constants::DEFAULT_ATTESTATION_TIMEOUT_MS,
            finality_timeout_ms: constants::DEFAULT_FINALITY_TIMEOUT_MS,
            sequencer_timeout_ms: constants::DEFAULT_SEQUENCER_TIMEOUT_MS,
            selection: SelectionPolicy::default(),
            forward_supply_copy: true,
        }
    }
}

impl FlowConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LedgerError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject timeouts of zero.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("attestation_timeout_ms", self.attestation_timeout_ms),
            ("finality_timeout_ms", self.finality_timeout_ms),
            ("sequencer_timeout_ms", self.sequencer_timeout_ms),
        ] {
            if value == 0 {
                return Err(LedgerError::Configuration(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn attestation_timeout(&self) -> Duration {
        Duration::from_millis(self.attestation_timeout_ms)
    }

    #[must_use]
    pub fn finality_timeout(&self) -> Duration {
        Duration::from_millis(self.finality_timeout_ms)
    }

    #[must_use]
    pub fn sequencer_timeout(&self) -> Duration {
        Duration::from_millis(self.sequencer_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = FlowConfig::default();
        assert_eq!(cfg.attestation_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.sequencer_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.selection, SelectionPolicy::SmallestSufficient);
        assert!(cfg.forward_supply_copy);
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = FlowConfig::from_json(r#"{"selection":"first_recorded","sequencer_timeout_ms":500}"#)
            .unwrap();
        assert_eq!(cfg.selection, SelectionPolicy::FirstRecorded);
        assert_eq!(cfg.sequencer_timeout(), Duration::from_millis(500));
        assert_eq!(
            cfg.attestation_timeout_ms,
            constants::DEFAULT_ATTESTATION_TIMEOUT_MS
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = FlowConfig::from_json(r#"{"attestation_timeout_ms":0}"#).unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }

    #[test]
    fn malformed_json_is_configuration_error() {
        let err = FlowConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }
}
