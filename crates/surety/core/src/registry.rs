use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surety_types::{AccountId, FlightKey, FlightStatus, SuretyError, SuretyResult};
use tracing::info;

/// A registered flight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flight {
    pub key: FlightKey,
    pub airline: AccountId,
    pub code: String,
    /// Departure time, seconds since the Unix epoch
    pub timestamp: u64,
    pub status: FlightStatus,
    pub registered_at: DateTime<Utc>,
    /// When the status was resolved
    pub updated_at: Option<DateTime<Utc>>,
}

impl Flight {
    pub fn is_resolved(&self) -> bool {
        self.status.is_final()
    }
}

/// Flight registry: the single owner of flight records.
///
/// Sponsor eligibility is checked by the caller against governance; the
/// registry only guarantees key uniqueness and write-once status.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FlightRegistry {
    flights: BTreeMap<FlightKey, Flight>,
}

impl FlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        airline: &AccountId,
        code: &str,
        timestamp: u64,
    ) -> SuretyResult<FlightKey> {
        let key = FlightKey::derive(airline, code, timestamp);
        if self.flights.contains_key(&key) {
            return Err(SuretyError::AlreadyRegistered(key));
        }
        self.flights.insert(
            key,
            Flight {
                key,
                airline: airline.clone(),
                code: code.to_string(),
                timestamp,
                status: FlightStatus::Unknown,
                registered_at: Utc::now(),
                updated_at: None,
            },
        );
        info!(flight = %key, airline = %airline, code, timestamp, "Flight registered");
        Ok(key)
    }

    pub fn is_flight(&self, key: &FlightKey) -> bool {
        self.flights.contains_key(key)
    }

    pub fn flight(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    /// The flight if it exists, else `FlightNotRegistered`.
    pub fn require(&self, key: &FlightKey) -> SuretyResult<&Flight> {
        self.flights
            .get(key)
            .ok_or(SuretyError::FlightNotRegistered(*key))
    }

    pub fn flights(&self) -> impl Iterator<Item = &Flight> {
        self.flights.values()
    }

    pub fn flights_for_airline<'a>(
        &'a self,
        airline: &'a AccountId,
    ) -> impl Iterator<Item = &'a Flight> + 'a {
        self.flights.values().filter(move |f| f.airline == *airline)
    }

    /// Write the final status. Succeeds at most once per flight.
    pub(crate) fn resolve(&mut self, key: &FlightKey, status: FlightStatus) -> SuretyResult<()> {
        let flight = self
            .flights
            .get_mut(key)
            .ok_or(SuretyError::FlightNotRegistered(*key))?;
        if flight.is_resolved() {
            return Err(SuretyError::AlreadyResolved(*key));
        }
        flight.status = status;
        flight.updated_at = Some(Utc::now());
        Ok(())
    }
}
