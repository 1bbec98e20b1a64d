//! HTTP handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use surety_core::LedgerRuntime;
use surety_types::Amount;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Ledger handle
    pub runtime: LedgerRuntime,

    /// Relay version
    pub version: String,

    /// Relay start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(runtime: LedgerRuntime) -> Self {
        Self {
            runtime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiMessage {
    pub message: String,
}

/// Fixed banner for dapp clients
pub async fn api_info() -> Json<ApiMessage> {
    Json(ApiMessage {
        message: "An API for use with your Dapp!".to_string(),
    })
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Ledger summary
#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerStatusResponse {
    pub operational: bool,
    pub registered_airlines: usize,
    pub active_airlines: usize,
    pub flights: usize,
    pub oracles: usize,
    pub treasury_balance: Amount,
    pub events: usize,
}

/// Ledger status endpoint
pub async fn ledger_status(State(state): State<AppState>) -> Json<LedgerStatusResponse> {
    let status = state
        .runtime
        .query(|p| LedgerStatusResponse {
            operational: p.is_operational(),
            registered_airlines: p.registered_airline_count(),
            active_airlines: p.active_airline_count(),
            flights: p.flights().count(),
            oracles: p.state().consensus.oracle_count(),
            treasury_balance: p.treasury().balance(),
            events: p.journal().len(),
        })
        .await;
    Json(status)
}
