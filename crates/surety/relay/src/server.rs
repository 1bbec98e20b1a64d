//! Server setup and lifecycle management

use std::sync::Arc;

use axum::{routing::get, Router};
use surety_core::{FlightSuretyProtocol, LedgerRuntime, SeededIndexSelector};
use surety_types::AccountId;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::client::{OracleFleet, RandomStatusPolicy};
use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::health::{self, AppState};

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new().route("/status", get(health::ledger_status));

    Router::new()
        .route("/api", get(health::api_info))
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Deploy a fresh protocol from `config`.
pub fn deploy(config: &RelayConfig) -> RelayResult<LedgerRuntime> {
    let deployment = &config.deployment;
    let selector = match deployment.index_seed {
        Some(seed) => SeededIndexSelector::new(seed),
        None => SeededIndexSelector::from_entropy(),
    };
    let protocol = FlightSuretyProtocol::builder(
        AccountId::new(deployment.owner.as_str()),
        AccountId::new(deployment.first_airline.as_str()),
        deployment.first_airline_name.as_str(),
    )
    .selector(selector)
    .event_capacity(deployment.event_capacity)
    .build()?;
    Ok(LedgerRuntime::new(protocol))
}

/// Flight Surety relay server
pub struct Server {
    config: RelayConfig,
    runtime: LedgerRuntime,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        let runtime = deploy(&config)?;
        Ok(Self { config, runtime })
    }

    pub fn runtime(&self) -> &LedgerRuntime {
        &self.runtime
    }

    /// Run the relay and the HTTP surface until shutdown
    pub async fn run(self) -> RelayResult<()> {
        let addr = self.config.server.listen_addr;

        let fleet = OracleFleet::register(Arc::new(self.runtime.clone()), &self.config.oracles)
            .await?;
        tracing::info!(oracles = fleet.oracles().len(), "Oracle fleet registered");

        let policy = match self.config.oracles.status_seed {
            Some(seed) => RandomStatusPolicy::new(seed),
            None => RandomStatusPolicy::from_entropy(),
        };
        let relay = fleet.spawn(policy);

        let app = create_router(AppState::new(self.runtime.clone()));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Flight Surety relay listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| RelayError::Server(e.to_string()))?;

        tracing::info!("Flight Surety relay shutting down");
        relay.abort();
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
