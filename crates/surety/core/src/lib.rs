//! # surety-core
//!
//! The authoritative logic of the Flight Surety protocol:
//!
//! - **OperationalGate**: owner-controlled switch blocking every mutation
//! - **AirlineGovernance**: founders' fast path, then strict-majority voting
//!   among active airlines; funding activates an airline
//! - **FlightRegistry**: flights keyed by (airline, code, departure time)
//! - **InsuranceLedger**: capped premiums, 3/2 credit on airline-caused
//!   delay, pull-payment withdrawal that zeroes before it transfers
//! - **OracleConsensus**: indexed oracles, request emission, quorum-triggered
//!   finalization that settles a flight exactly once
//!
//! ## Execution model
//!
//! `FlightSuretyProtocol` applies each mutating operation to a draft of its
//! state and commits the draft only when the whole operation succeeds, so a
//! failure is never partially visible. Events are published on commit.
//! `LedgerRuntime` serializes operations from many tasks into one total order.

pub mod gate;
pub mod governance;
pub mod insurance;
pub mod oracle;
pub mod payout;
pub mod protocol;
pub mod registry;
pub mod runtime;
pub mod selection;
pub mod treasury;

pub use gate::OperationalGate;
pub use governance::{AdmissionOutcome, Airline, AirlineGovernance, AirlineState, FundingOutcome};
pub use insurance::{Credit, InsuranceLedger, InsurancePolicy, Settlement};
pub use oracle::{OracleConsensus, OracleRecord, OracleRequest, OracleResponse, ResponseOutcome};
pub use payout::{ExternalAccounts, PayoutRail};
pub use protocol::{FlightSuretyProtocol, ProtocolBuilder, ProtocolState, Submission};
pub use registry::{Flight, FlightRegistry};
pub use runtime::LedgerRuntime;
pub use selection::{IndexSelector, RoundRobinSelector, SeededIndexSelector};
pub use treasury::Treasury;

pub use surety_types::{
    AccountId, Amount, ErrorKind, EventPayload, FlightKey, FlightStatus, ProtocolEvent,
    ProtocolParameters, RequestKey, SuretyError, SuretyResult, UNIT,
};
