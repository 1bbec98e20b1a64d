use serde::{Deserialize, Serialize};
use surety_types::{AccountId, SuretyError, SuretyResult};
use tracing::info;

/// Operational gate: a single owner-controlled switch.
///
/// While the gate is closed every mutating entry point fails with
/// `NotOperational`. Reads stay available. Nothing is queued while closed and
/// nothing resumes automatically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationalGate {
    owner: AccountId,
    operational: bool,
}

impl OperationalGate {
    /// A gate owned by `owner`, initially open.
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            operational: true,
        }
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    /// Flip the switch. Only the owner may do this, whatever the current value.
    ///
    /// Returns whether the value actually changed.
    pub fn set_operational(&mut self, caller: &AccountId, value: bool) -> SuretyResult<bool> {
        if *caller != self.owner {
            return Err(SuretyError::Unauthorized(caller.clone()));
        }
        let changed = self.operational != value;
        self.operational = value;
        if changed {
            info!(operational = value, "Operational status changed");
        }
        Ok(changed)
    }

    pub fn require_operational(&self) -> SuretyResult<()> {
        if self.operational {
            Ok(())
        } else {
            Err(SuretyError::NotOperational)
        }
    }
}
