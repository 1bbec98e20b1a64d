use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surety_types::{
    AccountId, Amount, FlightKey, FlightStatus, ProtocolParameters, RequestKey, SuretyError,
    SuretyResult,
};
use tracing::{debug, info};

use crate::registry::Flight;
use crate::selection::IndexSelector;

/// A registered oracle identity and the indexes it answers for.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OracleRecord {
    pub oracle: AccountId,
    pub indexes: Vec<u8>,
    pub fee_paid: Amount,
    pub registered_at: DateTime<Utc>,
}

impl OracleRecord {
    pub fn holds(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

/// One status request: `Open → (responses accumulate) → Closed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OracleRequest {
    pub key: RequestKey,
    pub index: u8,
    pub flight: FlightKey,
    pub airline: AccountId,
    pub code: String,
    pub timestamp: u64,
    pub requester: AccountId,
    pub open: bool,
    /// status -> distinct oracles that reported it
    pub responses: BTreeMap<FlightStatus, BTreeSet<AccountId>>,
    /// Status that reached quorum, set when the request closes
    pub outcome: Option<FlightStatus>,
    pub opened_at: DateTime<Utc>,
}

impl OracleRequest {
    pub fn response_count(&self, status: FlightStatus) -> usize {
        self.responses.get(&status).map_or(0, BTreeSet::len)
    }

    pub fn has_responded(&self, oracle: &AccountId) -> bool {
        self.responses.values().any(|oracles| oracles.contains(oracle))
    }
}

/// A response as submitted by a relay client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResponse {
    pub index: u8,
    pub airline: AccountId,
    pub code: String,
    pub timestamp: u64,
    pub status: FlightStatus,
}

impl OracleResponse {
    pub fn request_key(&self) -> RequestKey {
        RequestKey::derive(self.index, &self.airline, &self.code, self.timestamp)
    }

    pub fn flight_key(&self) -> FlightKey {
        FlightKey::derive(&self.airline, &self.code, self.timestamp)
    }
}

/// Result of recording one response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Counted; no status has reached quorum yet
    Recorded {
        request: RequestKey,
        status: FlightStatus,
        count: usize,
    },
    /// This response brought `status` to quorum and closed the request
    QuorumReached {
        request: RequestKey,
        flight: FlightKey,
        status: FlightStatus,
        count: usize,
    },
}

impl ResponseOutcome {
    pub fn count(&self) -> usize {
        match self {
            ResponseOutcome::Recorded { count, .. } | ResponseOutcome::QuorumReached { count, .. } => {
                *count
            }
        }
    }
}

/// Oracle consensus: registration, request tracking and quorum detection.
///
/// Closing a request happens in the same step as the increment that reaches
/// quorum, so finalization can fire at most once per request key.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OracleConsensus {
    oracles: BTreeMap<AccountId, OracleRecord>,
    requests: BTreeMap<RequestKey, OracleRequest>,
}

impl OracleConsensus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `oracle` and assign its indexes.
    pub fn register(
        &mut self,
        oracle: &AccountId,
        fee: Amount,
        params: &ProtocolParameters,
        selector: &mut dyn IndexSelector,
    ) -> SuretyResult<Vec<u8>> {
        if fee < params.registration_fee {
            return Err(SuretyError::InsufficientFee {
                amount: fee,
                required: params.registration_fee,
            });
        }
        if self.oracles.contains_key(oracle) {
            return Err(SuretyError::OracleAlreadyRegistered(oracle.clone()));
        }

        let indexes =
            selector.distinct_indexes(params.indexes_per_oracle, params.oracle_index_range);
        info!(oracle = %oracle, indexes = ?indexes, "Oracle registered");
        self.oracles.insert(
            oracle.clone(),
            OracleRecord {
                oracle: oracle.clone(),
                indexes: indexes.clone(),
                fee_paid: fee,
                registered_at: Utc::now(),
            },
        );
        Ok(indexes)
    }

    pub fn oracle(&self, oracle: &AccountId) -> Option<&OracleRecord> {
        self.oracles.get(oracle)
    }

    pub fn is_oracle(&self, oracle: &AccountId) -> bool {
        self.oracles.contains_key(oracle)
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    /// Indexes assigned to `oracle`.
    pub fn indexes(&self, oracle: &AccountId) -> SuretyResult<&[u8]> {
        self.oracles
            .get(oracle)
            .map(|record| record.indexes.as_slice())
            .ok_or_else(|| SuretyError::OracleNotRegistered(oracle.clone()))
    }

    pub fn request(&self, key: &RequestKey) -> Option<&OracleRequest> {
        self.requests.get(key)
    }

    pub fn open_requests(&self) -> impl Iterator<Item = &OracleRequest> {
        self.requests.values().filter(|r| r.open)
    }

    /// Open a request for `flight` routed to `index`.
    ///
    /// An identical request that is still open is kept as is, responses
    /// included. A closed one is replaced by a fresh record.
    pub fn open_request(&mut self, index: u8, flight: &Flight, requester: &AccountId) -> RequestKey {
        let key = RequestKey::derive(index, &flight.airline, &flight.code, flight.timestamp);
        if self.requests.get(&key).is_some_and(|r| r.open) {
            debug!(request = %key, "Request already open");
            return key;
        }

        self.requests.insert(
            key,
            OracleRequest {
                key,
                index,
                flight: flight.key,
                airline: flight.airline.clone(),
                code: flight.code.clone(),
                timestamp: flight.timestamp,
                requester: requester.clone(),
                open: true,
                responses: BTreeMap::new(),
                outcome: None,
                opened_at: Utc::now(),
            },
        );
        info!(request = %key, index, flight = %flight.key, "Status request opened");
        key
    }

    /// Count `oracle`'s response; close the request when a status reaches quorum.
    pub fn record_response(
        &mut self,
        oracle: &AccountId,
        response: &OracleResponse,
        params: &ProtocolParameters,
    ) -> SuretyResult<ResponseOutcome> {
        let record = self
            .oracles
            .get(oracle)
            .ok_or_else(|| SuretyError::OracleNotRegistered(oracle.clone()))?;
        if !record.holds(response.index) {
            return Err(SuretyError::IndexNotAssigned {
                oracle: oracle.clone(),
                index: response.index,
            });
        }

        let key = response.request_key();
        let request = self
            .requests
            .get_mut(&key)
            .ok_or(SuretyError::RequestNotFound(key))?;
        if !request.open {
            return Err(SuretyError::RequestClosed(key));
        }
        if request.has_responded(oracle) {
            return Err(SuretyError::DuplicateResponse {
                oracle: oracle.clone(),
                request: key,
            });
        }

        let responders = request.responses.entry(response.status).or_default();
        responders.insert(oracle.clone());
        let count = responders.len();

        if count >= params.min_responses {
            request.open = false;
            request.outcome = Some(response.status);
            info!(request = %key, status = %response.status, count, "Quorum reached");
            return Ok(ResponseOutcome::QuorumReached {
                request: key,
                flight: request.flight,
                status: response.status,
                count,
            });
        }

        debug!(request = %key, oracle = %oracle, status = %response.status, count, "Response recorded");
        Ok(ResponseOutcome::Recorded {
            request: key,
            status: response.status,
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FlightRegistry;
    use crate::selection::RoundRobinSelector;
    use surety_types::UNIT;

    fn oracle(n: usize) -> AccountId {
        AccountId::new(format!("oracle-{}", n))
    }

    fn airline() -> AccountId {
        AccountId::new("airline-1")
    }

    fn flight() -> Flight {
        let mut registry = FlightRegistry::new();
        let key = registry.register(&airline(), "ND1309", 1_700_000_000).unwrap();
        registry.flight(&key).unwrap().clone()
    }

    fn response(index: u8, status: FlightStatus) -> OracleResponse {
        OracleResponse {
            index,
            airline: airline(),
            code: "ND1309".into(),
            timestamp: 1_700_000_000,
            status,
        }
    }

    /// Five oracles that all hold indexes 0, 1 and 2.
    fn consensus() -> OracleConsensus {
        let mut consensus = OracleConsensus::new();
        let params = ProtocolParameters::default();
        for n in 0..5 {
            let mut selector = RoundRobinSelector::new();
            consensus
                .register(&oracle(n), UNIT, &params, &mut selector)
                .unwrap();
        }
        consensus
    }

    #[test]
    fn registration_requires_fee_and_is_unique() {
        let mut consensus = OracleConsensus::new();
        let params = ProtocolParameters::default();
        let mut selector = RoundRobinSelector::new();
        assert_eq!(
            consensus.register(&oracle(1), UNIT - 1, &params, &mut selector),
            Err(SuretyError::InsufficientFee {
                amount: UNIT - 1,
                required: UNIT
            })
        );
        let indexes = consensus
            .register(&oracle(1), UNIT, &params, &mut selector)
            .unwrap();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(consensus.indexes(&oracle(1)).unwrap(), &[0, 1, 2]);
        assert_eq!(
            consensus.register(&oracle(1), UNIT, &params, &mut selector),
            Err(SuretyError::OracleAlreadyRegistered(oracle(1)))
        );
        assert_eq!(
            consensus.indexes(&oracle(9)),
            Err(SuretyError::OracleNotRegistered(oracle(9)))
        );
    }

    #[test]
    fn unassigned_index_is_rejected() {
        let mut consensus = consensus();
        consensus.open_request(5, &flight(), &airline());
        assert_eq!(
            consensus.record_response(
                &oracle(0),
                &response(5, FlightStatus::OnTime),
                &ProtocolParameters::default()
            ),
            Err(SuretyError::IndexNotAssigned {
                oracle: oracle(0),
                index: 5
            })
        );
    }

    #[test]
    fn response_without_request_is_rejected() {
        let mut consensus = consensus();
        let err = consensus
            .record_response(
                &oracle(0),
                &response(1, FlightStatus::OnTime),
                &ProtocolParameters::default(),
            )
            .unwrap_err();
        assert!(matches!(err, SuretyError::RequestNotFound(_)));
    }

    #[test]
    fn quorum_closes_exactly_once() {
        let mut consensus = consensus();
        let params = ProtocolParameters::default();
        let key = consensus.open_request(1, &flight(), &airline());

        let first = consensus
            .record_response(&oracle(0), &response(1, FlightStatus::LateAirline), &params)
            .unwrap();
        assert_eq!(first.count(), 1);
        consensus
            .record_response(&oracle(1), &response(1, FlightStatus::OnTime), &params)
            .unwrap();
        consensus
            .record_response(&oracle(2), &response(1, FlightStatus::LateAirline), &params)
            .unwrap();
        let closing = consensus
            .record_response(&oracle(3), &response(1, FlightStatus::LateAirline), &params)
            .unwrap();
        assert!(matches!(
            closing,
            ResponseOutcome::QuorumReached {
                status: FlightStatus::LateAirline,
                count: 3,
                ..
            }
        ));

        let request = consensus.request(&key).unwrap();
        assert!(!request.open);
        assert_eq!(request.outcome, Some(FlightStatus::LateAirline));

        assert_eq!(
            consensus.record_response(&oracle(4), &response(1, FlightStatus::LateAirline), &params),
            Err(SuretyError::RequestClosed(key))
        );
        assert_eq!(
            consensus.request(&key).unwrap().response_count(FlightStatus::LateAirline),
            3
        );
    }

    #[test]
    fn an_oracle_counts_once_per_request() {
        let mut consensus = consensus();
        let params = ProtocolParameters::default();
        let key = consensus.open_request(2, &flight(), &airline());
        consensus
            .record_response(&oracle(0), &response(2, FlightStatus::OnTime), &params)
            .unwrap();
        assert_eq!(
            consensus.record_response(&oracle(0), &response(2, FlightStatus::OnTime), &params),
            Err(SuretyError::DuplicateResponse {
                oracle: oracle(0),
                request: key
            })
        );
        assert_eq!(
            consensus.record_response(&oracle(0), &response(2, FlightStatus::LateOther), &params),
            Err(SuretyError::DuplicateResponse {
                oracle: oracle(0),
                request: key
            })
        );
    }

    #[test]
    fn reopening_keeps_an_open_request_and_resets_a_closed_one() {
        let mut consensus = consensus();
        let params = ProtocolParameters::default();
        let flight = flight();
        let key = consensus.open_request(0, &flight, &airline());
        consensus
            .record_response(&oracle(0), &response(0, FlightStatus::Unknown), &params)
            .unwrap();
        assert_eq!(consensus.open_request(0, &flight, &airline()), key);
        assert_eq!(
            consensus.request(&key).unwrap().response_count(FlightStatus::Unknown),
            1
        );

        for n in 1..3 {
            consensus
                .record_response(&oracle(n), &response(0, FlightStatus::Unknown), &params)
                .unwrap();
        }
        assert!(!consensus.request(&key).unwrap().open);

        consensus.open_request(0, &flight, &airline());
        let reopened = consensus.request(&key).unwrap();
        assert!(reopened.open);
        assert!(reopened.responses.is_empty());
        assert_eq!(consensus.open_requests().count(), 1);
    }
}
