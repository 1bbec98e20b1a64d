use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, Amount, FlightKey, RequestKey};
use crate::status::FlightStatus;

/// Event identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub uuid::Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// An event published by a committed protocol operation.
///
/// Events are immutable once created. `sequence` is the position in the
/// ledger's total order; it has no gaps across committed events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolEvent {
    pub id: EventId,
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl ProtocolEvent {
    pub fn new(sequence: u64, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            sequence,
            emitted_at: Utc::now(),
            payload,
        }
    }
}

/// Event payloads, one per observable state transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    OperationalStatusChanged {
        operational: bool,
    },
    AirlineNominated {
        airline: AccountId,
        sponsor: AccountId,
    },
    AirlineVoted {
        airline: AccountId,
        voter: AccountId,
        votes: usize,
    },
    AirlineRegistered {
        airline: AccountId,
        name: String,
    },
    AirlineFunded {
        airline: AccountId,
        stake: Amount,
    },
    FlightRegistered {
        flight: FlightKey,
        airline: AccountId,
        code: String,
        timestamp: u64,
    },
    InsurancePurchased {
        passenger: AccountId,
        flight: FlightKey,
        amount: Amount,
    },
    OracleRegistered {
        oracle: AccountId,
        indexes: Vec<u8>,
    },
    /// Relay clients holding `index` are expected to answer.
    StatusRequested {
        index: u8,
        airline: AccountId,
        code: String,
        timestamp: u64,
    },
    OracleReport {
        request: RequestKey,
        oracle: AccountId,
        status: FlightStatus,
        count: usize,
    },
    FlightStatusInfo {
        flight: FlightKey,
        airline: AccountId,
        code: String,
        timestamp: u64,
        status: FlightStatus,
    },
    PassengerCredited {
        passenger: AccountId,
        flight: FlightKey,
        amount: Amount,
    },
    CreditWithdrawn {
        passenger: AccountId,
        amount: Amount,
    },
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::OperationalStatusChanged { .. } => "operational_status_changed",
            EventPayload::AirlineNominated { .. } => "airline_nominated",
            EventPayload::AirlineVoted { .. } => "airline_voted",
            EventPayload::AirlineRegistered { .. } => "airline_registered",
            EventPayload::AirlineFunded { .. } => "airline_funded",
            EventPayload::FlightRegistered { .. } => "flight_registered",
            EventPayload::InsurancePurchased { .. } => "insurance_purchased",
            EventPayload::OracleRegistered { .. } => "oracle_registered",
            EventPayload::StatusRequested { .. } => "status_requested",
            EventPayload::OracleReport { .. } => "oracle_report",
            EventPayload::FlightStatusInfo { .. } => "flight_status_info",
            EventPayload::PassengerCredited { .. } => "passenger_credited",
            EventPayload::CreditWithdrawn { .. } => "credit_withdrawn",
        }
    }
}
