use surety_types::{
    AccountId, Amount, EventPayload, FlightKey, FlightStatus, ProtocolEvent, ProtocolParameters,
    SuretyError, SuretyResult,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::gate::OperationalGate;
use crate::governance::{AdmissionOutcome, Airline, AirlineGovernance, FundingOutcome};
use crate::insurance::{InsuranceLedger, InsurancePolicy};
use crate::oracle::{OracleConsensus, OracleResponse, ResponseOutcome};
use crate::payout::{ExternalAccounts, PayoutRail};
use crate::registry::{Flight, FlightRegistry};
use crate::selection::{IndexSelector, SeededIndexSelector};
use crate::treasury::Treasury;

const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Everything an operation may touch. Cloned into a draft per operation.
#[derive(Clone, Debug)]
pub struct ProtocolState {
    pub gate: OperationalGate,
    pub governance: AirlineGovernance,
    pub registry: FlightRegistry,
    pub ledger: InsuranceLedger,
    pub consensus: OracleConsensus,
    pub treasury: Treasury,
}

/// Effect of one oracle response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    /// Counted toward its status code
    Recorded { count: usize },
    /// Reached quorum and settled the flight
    Finalized {
        status: FlightStatus,
        credited: usize,
    },
    /// Reached quorum, but another request had already resolved the flight
    Closed { status: FlightStatus },
    /// Arrived after the request closed; ignored
    Dropped,
}

/// Draft of one operation: a private copy of the state plus the events it
/// will publish if it commits.
struct Transaction<'a> {
    state: ProtocolState,
    params: &'a ProtocolParameters,
    selector: &'a mut dyn IndexSelector,
    rail: &'a mut dyn PayoutRail,
    events: Vec<EventPayload>,
}

impl Transaction<'_> {
    fn emit(&mut self, payload: EventPayload) {
        self.events.push(payload);
    }

    fn require_operational(&self) -> SuretyResult<()> {
        self.state.gate.require_operational()
    }
}

/// Builder for [`FlightSuretyProtocol`].
pub struct ProtocolBuilder {
    owner: AccountId,
    first_airline: AccountId,
    first_airline_name: String,
    params: ProtocolParameters,
    selector: Option<Box<dyn IndexSelector>>,
    rail: Option<Box<dyn PayoutRail>>,
    event_capacity: usize,
}

impl ProtocolBuilder {
    pub fn new(
        owner: AccountId,
        first_airline: AccountId,
        first_airline_name: impl Into<String>,
    ) -> Self {
        Self {
            owner,
            first_airline,
            first_airline_name: first_airline_name.into(),
            params: ProtocolParameters::default(),
            selector: None,
            rail: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn params(mut self, params: ProtocolParameters) -> Self {
        self.params = params;
        self
    }

    /// Defaults to an entropy-seeded [`SeededIndexSelector`].
    pub fn selector(mut self, selector: impl IndexSelector + 'static) -> Self {
        self.selector = Some(Box::new(selector));
        self
    }

    /// Defaults to a fresh [`ExternalAccounts`].
    pub fn payout_rail(mut self, rail: impl PayoutRail + 'static) -> Self {
        self.rail = Some(Box::new(rail));
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> SuretyResult<FlightSuretyProtocol> {
        self.params.validate()?;

        let (events, _) = broadcast::channel(self.event_capacity);
        let mut protocol = FlightSuretyProtocol {
            state: ProtocolState {
                gate: OperationalGate::new(self.owner.clone()),
                governance: AirlineGovernance::with_founder(
                    self.first_airline.clone(),
                    self.first_airline_name.clone(),
                ),
                registry: FlightRegistry::new(),
                ledger: InsuranceLedger::new(),
                consensus: OracleConsensus::new(),
                treasury: Treasury::default(),
            },
            params: self.params,
            selector: self
                .selector
                .unwrap_or_else(|| Box::new(SeededIndexSelector::from_entropy())),
            rail: self
                .rail
                .unwrap_or_else(|| Box::new(ExternalAccounts::new())),
            journal: Vec::new(),
            events,
        };

        info!(
            owner = %self.owner,
            first_airline = %self.first_airline,
            "Flight Surety protocol deployed"
        );
        protocol.publish(vec![EventPayload::AirlineRegistered {
            airline: self.first_airline,
            name: self.first_airline_name,
        }]);
        Ok(protocol)
    }
}

/// The Flight Surety protocol.
///
/// Each mutating operation runs against a draft of [`ProtocolState`]; the
/// draft replaces the live state only when the operation returns `Ok`, and
/// only then are its events appended to the journal and broadcast. Every
/// mutating operation except `set_operational` checks the operational gate
/// first.
pub struct FlightSuretyProtocol {
    state: ProtocolState,
    params: ProtocolParameters,
    selector: Box<dyn IndexSelector>,
    rail: Box<dyn PayoutRail>,
    journal: Vec<ProtocolEvent>,
    events: broadcast::Sender<ProtocolEvent>,
}

impl FlightSuretyProtocol {
    pub fn builder(
        owner: AccountId,
        first_airline: AccountId,
        first_airline_name: impl Into<String>,
    ) -> ProtocolBuilder {
        ProtocolBuilder::new(owner, first_airline, first_airline_name)
    }

    fn transact<T, F>(&mut self, operation: &'static str, f: F) -> SuretyResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> SuretyResult<T>,
    {
        let committed = {
            let mut tx = Transaction {
                state: self.state.clone(),
                params: &self.params,
                selector: &mut *self.selector,
                rail: &mut *self.rail,
                events: Vec::new(),
            };
            f(&mut tx).map(|value| (value, tx.state, tx.events))
        };

        match committed {
            Ok((value, state, events)) => {
                self.state = state;
                self.publish(events);
                Ok(value)
            }
            Err(err) => {
                warn!(operation, error = %err, "Operation rejected");
                Err(err)
            }
        }
    }

    fn publish(&mut self, payloads: Vec<EventPayload>) {
        for payload in payloads {
            let event = ProtocolEvent::new(self.journal.len() as u64, payload);
            debug!(sequence = event.sequence, event = event.payload.name(), "Event published");
            self.journal.push(event.clone());
            // No receivers is fine; the journal keeps the event.
            let _ = self.events.send(event);
        }
    }

    // --- Operational gate ---

    pub fn set_operational(&mut self, caller: &AccountId, operational: bool) -> SuretyResult<()> {
        self.transact("set_operational", |tx| {
            if tx.state.gate.set_operational(caller, operational)? {
                tx.emit(EventPayload::OperationalStatusChanged { operational });
            }
            Ok(())
        })
    }

    // --- Airline governance ---

    /// Nominate `airline`; registers it directly while the founders' fast
    /// path is open.
    pub fn register_airline(
        &mut self,
        sponsor: &AccountId,
        airline: &AccountId,
        name: &str,
    ) -> SuretyResult<AdmissionOutcome> {
        self.transact("register_airline", |tx| {
            tx.require_operational()?;
            let outcome = tx.state.governance.nominate(sponsor, airline, name, tx.params)?;
            emit_admission(tx, sponsor, airline, &outcome);
            Ok(outcome)
        })
    }

    pub fn vote_airline(
        &mut self,
        voter: &AccountId,
        airline: &AccountId,
    ) -> SuretyResult<AdmissionOutcome> {
        self.transact("vote_airline", |tx| {
            tx.require_operational()?;
            let outcome = tx.state.governance.vote(voter, airline)?;
            emit_admission(tx, voter, airline, &outcome);
            Ok(outcome)
        })
    }

    /// Pay the stake. Nothing is charged when the airline is already active.
    pub fn fund_airline(
        &mut self,
        airline: &AccountId,
        amount: Amount,
    ) -> SuretyResult<FundingOutcome> {
        self.transact("fund_airline", |tx| {
            tx.require_operational()?;
            let outcome = tx.state.governance.fund(airline, amount, tx.params)?;
            if let FundingOutcome::Activated { stake } = outcome {
                tx.state.treasury.deposit(stake)?;
                tx.emit(EventPayload::AirlineFunded {
                    airline: airline.clone(),
                    stake,
                });
            }
            Ok(outcome)
        })
    }

    // --- Flights and insurance ---

    pub fn register_flight(
        &mut self,
        airline: &AccountId,
        code: &str,
        timestamp: u64,
    ) -> SuretyResult<FlightKey> {
        self.transact("register_flight", |tx| {
            tx.require_operational()?;
            tx.state.governance.require_active_sponsor(airline)?;
            let key = tx.state.registry.register(airline, code, timestamp)?;
            tx.emit(EventPayload::FlightRegistered {
                flight: key,
                airline: airline.clone(),
                code: code.to_string(),
                timestamp,
            });
            Ok(key)
        })
    }

    pub fn buy_insurance(
        &mut self,
        passenger: &AccountId,
        flight: &FlightKey,
        amount: Amount,
    ) -> SuretyResult<InsurancePolicy> {
        self.transact("buy_insurance", |tx| {
            tx.require_operational()?;
            let record = tx.state.registry.require(flight)?;
            let policy = tx.state.ledger.buy(passenger, record, amount, tx.params)?;
            tx.state.treasury.deposit(amount)?;
            tx.emit(EventPayload::InsurancePurchased {
                passenger: passenger.clone(),
                flight: *flight,
                amount,
            });
            Ok(policy)
        })
    }

    /// Pay out the passenger's whole credit.
    ///
    /// Credit is zeroed and the treasury debited before the payout rail runs.
    pub fn withdraw(&mut self, passenger: &AccountId) -> SuretyResult<Amount> {
        self.transact("withdraw", |tx| {
            tx.require_operational()?;
            let amount = tx.state.ledger.take_credit(passenger)?;
            tx.state.treasury.pay_out(amount)?;
            tx.rail.transfer(passenger, amount, &tx.state.ledger)?;
            info!(passenger = %passenger, amount, "Credit withdrawn");
            tx.emit(EventPayload::CreditWithdrawn {
                passenger: passenger.clone(),
                amount,
            });
            Ok(amount)
        })
    }

    // --- Oracle consensus ---

    pub fn register_oracle(&mut self, oracle: &AccountId, fee: Amount) -> SuretyResult<Vec<u8>> {
        self.transact("register_oracle", |tx| {
            tx.require_operational()?;
            let indexes = tx
                .state
                .consensus
                .register(oracle, fee, tx.params, &mut *tx.selector)?;
            tx.state.treasury.deposit(fee)?;
            tx.emit(EventPayload::OracleRegistered {
                oracle: oracle.clone(),
                indexes: indexes.clone(),
            });
            Ok(indexes)
        })
    }

    /// Ask the oracle network for a flight's status. Returns the index the
    /// request was routed to.
    pub fn request_flight_status(
        &mut self,
        requester: &AccountId,
        airline: &AccountId,
        code: &str,
        timestamp: u64,
    ) -> SuretyResult<u8> {
        self.transact("request_flight_status", |tx| {
            tx.require_operational()?;
            let key = FlightKey::derive(airline, code, timestamp);
            let flight = tx.state.registry.require(&key)?;
            if flight.is_resolved() {
                return Err(SuretyError::AlreadyResolved(key));
            }

            let index = tx.selector.next_index(tx.params.oracle_index_range);
            tx.state.consensus.open_request(index, flight, requester);
            tx.emit(EventPayload::StatusRequested {
                index,
                airline: airline.clone(),
                code: code.to_string(),
                timestamp,
            });
            Ok(index)
        })
    }

    pub fn submit_oracle_response(
        &mut self,
        oracle: &AccountId,
        response: &OracleResponse,
    ) -> SuretyResult<Submission> {
        self.transact("submit_oracle_response", |tx| {
            tx.require_operational()?;
            apply_response(tx, oracle, response)
        })
    }

    /// Apply several responses as one operation.
    ///
    /// Responses to closed requests are reported as `Dropped` and do not
    /// affect the others; any other failure rejects the whole batch.
    pub fn submit_oracle_responses(
        &mut self,
        oracle: &AccountId,
        batch: &[OracleResponse],
    ) -> SuretyResult<Vec<Submission>> {
        self.transact("submit_oracle_responses", |tx| {
            tx.require_operational()?;
            let mut submissions = Vec::with_capacity(batch.len());
            for response in batch {
                match apply_response(tx, oracle, response) {
                    Ok(submission) => submissions.push(submission),
                    Err(err) if err.is_droppable() => {
                        debug!(oracle = %oracle, error = %err, "Late response dropped");
                        submissions.push(Submission::Dropped);
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(submissions)
        })
    }

    // --- Reads ---

    pub fn params(&self) -> &ProtocolParameters {
        &self.params
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn owner(&self) -> &AccountId {
        self.state.gate.owner()
    }

    pub fn is_operational(&self) -> bool {
        self.state.gate.is_operational()
    }

    pub fn is_airline(&self, airline: &AccountId) -> bool {
        self.state.governance.is_airline(airline)
    }

    pub fn is_active_airline(&self, airline: &AccountId) -> bool {
        self.state.governance.is_active(airline)
    }

    pub fn airline(&self, airline: &AccountId) -> Option<&Airline> {
        self.state.governance.airline(airline)
    }

    pub fn registered_airline_count(&self) -> usize {
        self.state.governance.registered_count()
    }

    pub fn active_airline_count(&self) -> usize {
        self.state.governance.active_count()
    }

    pub fn get_flight_key(&self, airline: &AccountId, code: &str, timestamp: u64) -> FlightKey {
        FlightKey::derive(airline, code, timestamp)
    }

    pub fn is_flight(&self, flight: &FlightKey) -> bool {
        self.state.registry.is_flight(flight)
    }

    pub fn flight(&self, flight: &FlightKey) -> Option<&Flight> {
        self.state.registry.flight(flight)
    }

    pub fn flights(&self) -> impl Iterator<Item = &Flight> {
        self.state.registry.flights()
    }

    pub fn flight_status(&self, flight: &FlightKey) -> SuretyResult<FlightStatus> {
        self.state.registry.require(flight).map(|f| f.status)
    }

    pub fn view_insurance(&self, passenger: &AccountId, flight: &FlightKey) -> Amount {
        self.state.ledger.view_insurance(passenger, flight)
    }

    pub fn view_credits(&self, passenger: &AccountId) -> Amount {
        self.state.ledger.view_credits(passenger)
    }

    pub fn insurees(&self, flight: &FlightKey) -> Vec<AccountId> {
        self.state.ledger.insurees(flight)
    }

    pub fn oracle_indexes(&self, oracle: &AccountId) -> SuretyResult<Vec<u8>> {
        self.state.consensus.indexes(oracle).map(<[u8]>::to_vec)
    }

    pub fn treasury(&self) -> &Treasury {
        &self.state.treasury
    }

    /// Every committed event, in order.
    pub fn journal(&self) -> &[ProtocolEvent] {
        &self.journal
    }

    /// Committed events with `sequence >= from`.
    pub fn events_since(&self, from: u64) -> &[ProtocolEvent] {
        let start = (from as usize).min(self.journal.len());
        &self.journal[start..]
    }

    /// Live stream of events committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<ProtocolEvent> {
        self.events.clone()
    }
}

fn emit_admission(
    tx: &mut Transaction<'_>,
    actor: &AccountId,
    airline: &AccountId,
    outcome: &AdmissionOutcome,
) {
    match outcome {
        AdmissionOutcome::Nominated { .. } => tx.emit(EventPayload::AirlineNominated {
            airline: airline.clone(),
            sponsor: actor.clone(),
        }),
        AdmissionOutcome::VoteRecorded { votes, .. } | AdmissionOutcome::Elected { votes, .. } => {
            tx.emit(EventPayload::AirlineVoted {
                airline: airline.clone(),
                voter: actor.clone(),
                votes: *votes,
            })
        }
        AdmissionOutcome::FastTracked => {}
    }

    if outcome.is_registered() {
        let name = tx
            .state
            .governance
            .airline(airline)
            .map(|a| a.name.clone())
            .unwrap_or_default();
        tx.emit(EventPayload::AirlineRegistered {
            airline: airline.clone(),
            name,
        });
    }
}

fn apply_response(
    tx: &mut Transaction<'_>,
    oracle: &AccountId,
    response: &OracleResponse,
) -> SuretyResult<Submission> {
    let outcome = tx
        .state
        .consensus
        .record_response(oracle, response, tx.params)?;

    let (request, count) = match &outcome {
        ResponseOutcome::Recorded { request, count, .. }
        | ResponseOutcome::QuorumReached { request, count, .. } => (*request, *count),
    };
    tx.emit(EventPayload::OracleReport {
        request,
        oracle: oracle.clone(),
        status: response.status,
        count,
    });

    let ResponseOutcome::QuorumReached { flight, status, .. } = outcome else {
        return Ok(Submission::Recorded { count });
    };

    if tx.state.registry.require(&flight)?.is_resolved() {
        debug!(flight = %flight, request = %request, "Flight already resolved; request closed without settling");
        return Ok(Submission::Closed { status });
    }

    let state = &mut tx.state;
    let settlement = state
        .ledger
        .settle_flight(&mut state.registry, &flight, status, tx.params)?;

    tx.emit(EventPayload::FlightStatusInfo {
        flight,
        airline: response.airline.clone(),
        code: response.code.clone(),
        timestamp: response.timestamp,
        status,
    });
    let credited = settlement.credits.len();
    for credit in settlement.credits {
        tx.emit(EventPayload::PassengerCredited {
            passenger: credit.passenger,
            flight: credit.flight,
            amount: credit.amount,
        });
    }
    Ok(Submission::Finalized { status, credited })
}
