use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use surety_types::{AccountId, Amount, SuretyError, SuretyResult};
use tracing::debug;

use crate::insurance::InsuranceLedger;

/// Moves withdrawn value out of the protocol.
///
/// `transfer` runs after the passenger's credit has been zeroed and the
/// treasury debited, and receives the ledger as it stands at that point. A
/// transfer error rolls the whole withdrawal back.
pub trait PayoutRail: Send {
    fn transfer(
        &mut self,
        to: &AccountId,
        amount: Amount,
        ledger: &InsuranceLedger,
    ) -> SuretyResult<()>;
}

/// In-process external balances. Clones share the same accounts.
#[derive(Clone, Debug, Default)]
pub struct ExternalAccounts {
    balances: Arc<RwLock<BTreeMap<AccountId, Amount>>>,
}

impl ExternalAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value received by `account` so far.
    pub fn balance(&self, account: &AccountId) -> Amount {
        self.balances
            .read()
            .map(|balances| balances.get(account).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total(&self) -> Amount {
        self.balances
            .read()
            .map(|balances| {
                balances
                    .values()
                    .fold(0 as Amount, |acc, b| acc.saturating_add(*b))
            })
            .unwrap_or(0)
    }
}

impl PayoutRail for ExternalAccounts {
    fn transfer(
        &mut self,
        to: &AccountId,
        amount: Amount,
        _ledger: &InsuranceLedger,
    ) -> SuretyResult<()> {
        let mut balances = self.balances.write().map_err(|_| SuretyError::TransferFailed {
            to: to.clone(),
            reason: "account store poisoned".into(),
        })?;
        let balance = balances.entry(to.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(SuretyError::ArithmeticOverflow("external balance"))?;
        debug!(to = %to, amount, "Payout transferred");
        Ok(())
    }
}
