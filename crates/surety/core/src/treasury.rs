use serde::{Deserialize, Serialize};
use surety_types::{Amount, SuretyError, SuretyResult};

/// Escrowed protocol funds: airline stakes, premiums and oracle fees.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Treasury {
    balance: Amount,
    total_deposited: Amount,
    total_paid_out: Amount,
}

impl Treasury {
    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn total_deposited(&self) -> Amount {
        self.total_deposited
    }

    pub fn total_paid_out(&self) -> Amount {
        self.total_paid_out
    }

    pub(crate) fn deposit(&mut self, amount: Amount) -> SuretyResult<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(SuretyError::ArithmeticOverflow("treasury balance"))?;
        self.total_deposited = self.total_deposited.saturating_add(amount);
        Ok(())
    }

    pub(crate) fn pay_out(&mut self, amount: Amount) -> SuretyResult<()> {
        if amount > self.balance {
            return Err(SuretyError::TreasuryShortfall {
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.total_paid_out = self.total_paid_out.saturating_add(amount);
        Ok(())
    }
}
