use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surety_types::{
    AccountId, Amount, FlightKey, FlightStatus, ProtocolParameters, SuretyError, SuretyResult,
};
use tracing::{debug, info};

use crate::registry::{Flight, FlightRegistry};

/// A passenger's policy on one flight. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub passenger: AccountId,
    pub flight: FlightKey,
    pub amount_paid: Amount,
    pub purchased_at: DateTime<Utc>,
}

/// Credit granted to one passenger when a flight settles as payable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub passenger: AccountId,
    pub flight: FlightKey,
    pub amount: Amount,
}

/// Result of settling a flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub flight: FlightKey,
    pub status: FlightStatus,
    /// One entry per policy on the flight when the status pays out, else empty
    pub credits: Vec<Credit>,
}

/// Insurance ledger: premium escrow, credit computation and pull payments.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InsuranceLedger {
    /// flight -> passenger -> policy
    policies: BTreeMap<FlightKey, BTreeMap<AccountId, InsurancePolicy>>,
    /// passenger -> withdrawable credit
    credits: BTreeMap<AccountId, Amount>,
}

impl InsuranceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy for `passenger` on `flight`.
    ///
    /// A second purchase for the same pair is rejected, never merged.
    pub fn buy(
        &mut self,
        passenger: &AccountId,
        flight: &Flight,
        amount: Amount,
        params: &ProtocolParameters,
    ) -> SuretyResult<InsurancePolicy> {
        if amount == 0 {
            return Err(SuretyError::ZeroAmount);
        }
        if amount > params.insurance_cap {
            return Err(SuretyError::AmountExceedsCap {
                amount,
                cap: params.insurance_cap,
            });
        }
        if flight.is_resolved() {
            return Err(SuretyError::AlreadyResolved(flight.key));
        }

        let insured = self.policies.entry(flight.key).or_default();
        if insured.contains_key(passenger) {
            return Err(SuretyError::DuplicatePolicy {
                passenger: passenger.clone(),
                flight: flight.key,
            });
        }

        let policy = InsurancePolicy {
            passenger: passenger.clone(),
            flight: flight.key,
            amount_paid: amount,
            purchased_at: Utc::now(),
        };
        insured.insert(passenger.clone(), policy.clone());
        info!(passenger = %passenger, flight = %flight.key, amount, "Insurance purchased");
        Ok(policy)
    }

    /// Write a flight's final status and, for an airline-caused delay, credit
    /// every insured passenger `floor(amount_paid * 3 / 2)`.
    ///
    /// Only oracle consensus calls this. A second settlement of the same
    /// flight fails with `AlreadyResolved`. `Unknown` is not a resolution:
    /// the flight stays open and nothing is credited.
    pub(crate) fn settle_flight(
        &mut self,
        registry: &mut FlightRegistry,
        key: &FlightKey,
        status: FlightStatus,
        params: &ProtocolParameters,
    ) -> SuretyResult<Settlement> {
        let flight = registry.require(key)?;
        if flight.is_resolved() {
            return Err(SuretyError::AlreadyResolved(*key));
        }
        if !status.is_final() {
            debug!(flight = %key, "Consensus on unknown status; flight left open");
            return Ok(Settlement {
                flight: *key,
                status,
                credits: Vec::new(),
            });
        }

        let credits = if status.is_payable() {
            self.compute_credits(key, params)?
        } else {
            Vec::new()
        };

        // Apply on a copy so an overflow midway leaves balances untouched.
        let mut balances = self.credits.clone();
        for credit in &credits {
            let balance = balances.entry(credit.passenger.clone()).or_insert(0);
            *balance = balance
                .checked_add(credit.amount)
                .ok_or(SuretyError::ArithmeticOverflow("credit balance"))?;
        }

        registry.resolve(key, status)?;
        self.credits = balances;

        info!(
            flight = %key,
            status = %status,
            credited = credits.len(),
            "Flight settled"
        );
        Ok(Settlement {
            flight: *key,
            status,
            credits,
        })
    }

    fn compute_credits(
        &self,
        key: &FlightKey,
        params: &ProtocolParameters,
    ) -> SuretyResult<Vec<Credit>> {
        let Some(insured) = self.policies.get(key) else {
            return Ok(Vec::new());
        };
        insured
            .values()
            .map(|policy| -> SuretyResult<Credit> {
                let amount = params
                    .payout_for(policy.amount_paid)
                    .ok_or(SuretyError::ArithmeticOverflow("payout"))?;
                Ok(Credit {
                    passenger: policy.passenger.clone(),
                    flight: *key,
                    amount,
                })
            })
            .collect()
    }

    /// Read the passenger's whole credit and zero it.
    ///
    /// The caller transfers the returned amount only after this returns, so
    /// anything observing the ledger during the transfer sees zero.
    pub(crate) fn take_credit(&mut self, passenger: &AccountId) -> SuretyResult<Amount> {
        let amount = self.view_credits(passenger);
        if amount == 0 {
            return Err(SuretyError::NoCredit(passenger.clone()));
        }
        self.credits.insert(passenger.clone(), 0);
        debug!(passenger = %passenger, amount, "Credit zeroed for withdrawal");
        Ok(amount)
    }

    pub fn view_credits(&self, passenger: &AccountId) -> Amount {
        self.credits.get(passenger).copied().unwrap_or(0)
    }

    /// Premium paid by `passenger` on `flight`, zero when uninsured.
    pub fn view_insurance(&self, passenger: &AccountId, flight: &FlightKey) -> Amount {
        self.policy(passenger, flight)
            .map(|p| p.amount_paid)
            .unwrap_or(0)
    }

    pub fn policy(&self, passenger: &AccountId, flight: &FlightKey) -> Option<&InsurancePolicy> {
        self.policies.get(flight).and_then(|p| p.get(passenger))
    }

    /// Passengers holding a policy on `flight`.
    pub fn insurees(&self, flight: &FlightKey) -> Vec<AccountId> {
        self.policies
            .get(flight)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Sum of all outstanding credits.
    pub fn outstanding_credits(&self) -> Amount {
        self.credits.values().fold(0, |acc, c| acc.saturating_add(*c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use surety_types::UNIT;

    fn airline() -> AccountId {
        AccountId::new("airline-1")
    }

    fn passenger(n: usize) -> AccountId {
        AccountId::new(format!("passenger-{}", n))
    }

    fn setup() -> (FlightRegistry, InsuranceLedger, FlightKey) {
        let mut registry = FlightRegistry::new();
        let key = registry.register(&airline(), "ND1309", 1_700_000_000).unwrap();
        (registry, InsuranceLedger::new(), key)
    }

    fn buy(
        ledger: &mut InsuranceLedger,
        registry: &FlightRegistry,
        key: &FlightKey,
        who: &AccountId,
        amount: Amount,
    ) -> SuretyResult<InsurancePolicy> {
        let flight = registry.require(key)?.clone();
        ledger.buy(who, &flight, amount, &ProtocolParameters::default())
    }

    #[test]
    fn premium_above_cap_leaves_no_policy() {
        let (registry, mut ledger, key) = setup();
        let result = buy(&mut ledger, &registry, &key, &passenger(1), 2 * UNIT);
        assert_eq!(
            result,
            Err(SuretyError::AmountExceedsCap {
                amount: 2 * UNIT,
                cap: UNIT
            })
        );
        assert_eq!(ledger.view_insurance(&passenger(1), &key), 0);
        assert!(ledger.insurees(&key).is_empty());
    }

    #[test]
    fn premium_at_cap_is_accepted() {
        let (registry, mut ledger, key) = setup();
        buy(&mut ledger, &registry, &key, &passenger(1), UNIT).unwrap();
        assert_eq!(ledger.view_insurance(&passenger(1), &key), UNIT);
    }

    #[test]
    fn zero_premium_is_rejected() {
        let (registry, mut ledger, key) = setup();
        assert_eq!(
            buy(&mut ledger, &registry, &key, &passenger(1), 0),
            Err(SuretyError::ZeroAmount)
        );
    }

    #[test]
    fn second_purchase_is_rejected_not_merged() {
        let (registry, mut ledger, key) = setup();
        buy(&mut ledger, &registry, &key, &passenger(1), UNIT / 4).unwrap();
        assert_eq!(
            buy(&mut ledger, &registry, &key, &passenger(1), UNIT / 4),
            Err(SuretyError::DuplicatePolicy {
                passenger: passenger(1),
                flight: key
            })
        );
        assert_eq!(ledger.view_insurance(&passenger(1), &key), UNIT / 4);
    }

    #[test]
    fn late_airline_credits_each_policy_once() {
        let (mut registry, mut ledger, key) = setup();
        buy(&mut ledger, &registry, &key, &passenger(1), UNIT / 2).unwrap();
        buy(&mut ledger, &registry, &key, &passenger(2), 3).unwrap();

        let settlement = ledger
            .settle_flight(
                &mut registry,
                &key,
                FlightStatus::LateAirline,
                &ProtocolParameters::default(),
            )
            .unwrap();
        assert_eq!(settlement.credits.len(), 2);
        assert_eq!(ledger.view_credits(&passenger(1)), 3 * UNIT / 4);
        assert_eq!(ledger.view_credits(&passenger(2)), 4);

        assert_eq!(
            ledger.settle_flight(
                &mut registry,
                &key,
                FlightStatus::LateAirline,
                &ProtocolParameters::default()
            ),
            Err(SuretyError::AlreadyResolved(key))
        );
        assert_eq!(ledger.view_credits(&passenger(1)), 3 * UNIT / 4);
    }

    #[test]
    fn non_airline_delay_credits_nothing() {
        let (mut registry, mut ledger, key) = setup();
        buy(&mut ledger, &registry, &key, &passenger(1), UNIT / 2).unwrap();
        let settlement = ledger
            .settle_flight(
                &mut registry,
                &key,
                FlightStatus::LateWeather,
                &ProtocolParameters::default(),
            )
            .unwrap();
        assert!(settlement.credits.is_empty());
        assert_eq!(ledger.view_credits(&passenger(1)), 0);
        assert_eq!(
            registry.flight(&key).unwrap().status,
            FlightStatus::LateWeather
        );
    }

    #[test]
    fn unknown_status_leaves_flight_open() {
        let (mut registry, mut ledger, key) = setup();
        ledger
            .settle_flight(
                &mut registry,
                &key,
                FlightStatus::Unknown,
                &ProtocolParameters::default(),
            )
            .unwrap();
        assert!(!registry.flight(&key).unwrap().is_resolved());
    }

    #[test]
    fn credits_accumulate_across_flights() {
        let (mut registry, mut ledger, first) = setup();
        let second = registry.register(&airline(), "ND1310", 1).unwrap();
        let params = ProtocolParameters::default();
        buy(&mut ledger, &registry, &first, &passenger(1), UNIT).unwrap();
        buy(&mut ledger, &registry, &second, &passenger(1), UNIT / 2).unwrap();
        ledger
            .settle_flight(&mut registry, &first, FlightStatus::LateAirline, &params)
            .unwrap();
        ledger
            .settle_flight(&mut registry, &second, FlightStatus::LateAirline, &params)
            .unwrap();
        assert_eq!(
            ledger.view_credits(&passenger(1)),
            3 * UNIT / 2 + 3 * UNIT / 4
        );
    }

    #[test]
    fn resolved_flight_cannot_be_insured() {
        let (mut registry, mut ledger, key) = setup();
        ledger
            .settle_flight(
                &mut registry,
                &key,
                FlightStatus::OnTime,
                &ProtocolParameters::default(),
            )
            .unwrap();
        assert_eq!(
            buy(&mut ledger, &registry, &key, &passenger(1), UNIT / 2),
            Err(SuretyError::AlreadyResolved(key))
        );
    }

    #[test]
    fn take_credit_zeroes_balance() {
        let (mut registry, mut ledger, key) = setup();
        buy(&mut ledger, &registry, &key, &passenger(1), UNIT / 2).unwrap();
        ledger
            .settle_flight(
                &mut registry,
                &key,
                FlightStatus::LateAirline,
                &ProtocolParameters::default(),
            )
            .unwrap();
        assert_eq!(ledger.take_credit(&passenger(1)), Ok(3 * UNIT / 4));
        assert_eq!(ledger.view_credits(&passenger(1)), 0);
        assert_eq!(
            ledger.take_credit(&passenger(1)),
            Err(SuretyError::NoCredit(passenger(1)))
        );
    }

    proptest! {
        #[test]
        fn property_credit_is_floor_of_three_halves(
            premiums in proptest::collection::vec(1u128..=UNIT, 1..12)
        ) {
            let (mut registry, mut ledger, key) = setup();
            for (n, premium) in premiums.iter().enumerate() {
                buy(&mut ledger, &registry, &key, &passenger(n), *premium).unwrap();
            }
            ledger
                .settle_flight(&mut registry, &key, FlightStatus::LateAirline, &ProtocolParameters::default())
                .unwrap();
            for (n, premium) in premiums.iter().enumerate() {
                prop_assert_eq!(ledger.view_credits(&passenger(n)), premium * 3 / 2);
            }
            let total: u128 = premiums.iter().map(|p| p * 3 / 2).sum();
            prop_assert_eq!(ledger.outstanding_credits(), total);
        }
    }
}
