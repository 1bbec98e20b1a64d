use serde::{Deserialize, Serialize};

use crate::error::{SuretyError, SuretyResult};
use crate::ids::{Amount, UNIT};

/// Protocol parameters fixed at deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParameters {
    /// Largest premium a passenger may pay for one flight
    #[serde(default = "default_insurance_cap")]
    pub insurance_cap: Amount,

    /// Stake an airline must pay to become active
    #[serde(default = "default_minimum_stake")]
    pub minimum_stake: Amount,

    /// Fee an oracle pays to register
    #[serde(default = "default_registration_fee")]
    pub registration_fee: Amount,

    /// Oracle indexes are drawn from `[0, oracle_index_range)`
    #[serde(default = "default_oracle_index_range")]
    pub oracle_index_range: u8,

    /// Distinct indexes assigned to each oracle
    #[serde(default = "default_indexes_per_oracle")]
    pub indexes_per_oracle: usize,

    /// Matching responses needed to close a status request
    #[serde(default = "default_min_responses")]
    pub min_responses: usize,

    /// Below this many registered airlines, nomination registers directly
    #[serde(default = "default_founders_threshold")]
    pub founders_threshold: usize,

    #[serde(default = "default_payout_numerator")]
    pub payout_numerator: Amount,

    #[serde(default = "default_payout_denominator")]
    pub payout_denominator: Amount,
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            insurance_cap: default_insurance_cap(),
            minimum_stake: default_minimum_stake(),
            registration_fee: default_registration_fee(),
            oracle_index_range: default_oracle_index_range(),
            indexes_per_oracle: default_indexes_per_oracle(),
            min_responses: default_min_responses(),
            founders_threshold: default_founders_threshold(),
            payout_numerator: default_payout_numerator(),
            payout_denominator: default_payout_denominator(),
        }
    }
}

impl ProtocolParameters {
    /// Credit owed for a premium, rounded down. `None` on overflow.
    pub fn payout_for(&self, premium: Amount) -> Option<Amount> {
        premium
            .checked_mul(self.payout_numerator)
            .and_then(|scaled| scaled.checked_div(self.payout_denominator))
    }

    /// Reject parameter sets the protocol cannot run with.
    pub fn validate(&self) -> SuretyResult<()> {
        let invalid = |msg: &str| Err(SuretyError::InvalidParameters(msg.to_string()));
        if self.oracle_index_range == 0 {
            return invalid("oracle_index_range must be positive");
        }
        if self.indexes_per_oracle == 0 || self.indexes_per_oracle > self.oracle_index_range as usize {
            return invalid("indexes_per_oracle must be in 1..=oracle_index_range");
        }
        if self.min_responses == 0 {
            return invalid("min_responses must be positive");
        }
        if self.payout_denominator == 0 {
            return invalid("payout_denominator must be non-zero");
        }
        Ok(())
    }
}

fn default_insurance_cap() -> Amount {
    UNIT
}

fn default_minimum_stake() -> Amount {
    10 * UNIT
}

fn default_registration_fee() -> Amount {
    UNIT
}

fn default_oracle_index_range() -> u8 {
    10
}

fn default_indexes_per_oracle() -> usize {
    3
}

fn default_min_responses() -> usize {
    3
}

fn default_founders_threshold() -> usize {
    4
}

fn default_payout_numerator() -> Amount {
    3
}

fn default_payout_denominator() -> Amount {
    2
}
