//! Flight Surety relay library
//!
//! This crate hosts what runs around the protocol core:
//! - oracle relay clients answering status requests
//! - configuration loading
//! - the HTTP surface (`/api`, `/health`, `/api/v1/status`)
//! - server lifecycle management
//!
//! ## Limitations
//!
//! The HTTP surface is read-only. The `surety-relay` binary deploys a fresh
//! in-process ledger and registers its oracle fleet, but exposes no route to
//! register airlines or flights or to request a flight status. Status requests
//! therefore reach the fleet only from code sharing the same `LedgerRuntime`
//! (see `Server::runtime`), as the tests do.

pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod server;

pub use client::{
    FixedStatusPolicy, LedgerClient, OracleClient, OracleFleet, RandomStatusPolicy,
    StatusPolicy, StatusRequest,
};
pub use config::RelayConfig;
pub use error::{RelayError, RelayResult};
pub use server::{create_router, deploy, Server};
