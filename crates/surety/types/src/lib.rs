//! Core type definitions for Flight Surety.
//!
//! This crate provides the shared vocabulary of the protocol. No business
//! logic lives here, only identities, amounts, keys, status codes, protocol
//! parameters, events and the error taxonomy every other crate reports with.

pub mod error;
pub mod event;
pub mod ids;
pub mod params;
pub mod status;

pub use error::{ErrorKind, SuretyError, SuretyResult};
pub use event::{EventId, EventPayload, ProtocolEvent};
pub use ids::{AccountId, Amount, FlightKey, RequestKey, UNIT};
pub use params::ProtocolParameters;
pub use status::FlightStatus;
