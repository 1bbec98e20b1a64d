//! Configuration for the relay

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP surface
    #[serde(default)]
    pub server: ServerConfig,

    /// Protocol deployment
    #[serde(default)]
    pub deployment: DeploymentConfig,

    /// Oracle fleet
    #[serde(default)]
    pub oracles: OracleFleetConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Identities the protocol is deployed with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Contract owner, the only caller allowed to flip the operational gate
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Airline registered at deployment
    #[serde(default = "default_first_airline")]
    pub first_airline: String,

    #[serde(default = "default_first_airline_name")]
    pub first_airline_name: String,

    /// Seed for oracle index selection; entropy when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_seed: Option<u64>,

    /// Capacity of the event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            first_airline: default_first_airline(),
            first_airline_name: default_first_airline_name(),
            index_seed: None,
            event_capacity: default_event_capacity(),
        }
    }
}

/// Oracle fleet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleFleetConfig {
    /// Number of oracle identities to register
    #[serde(default = "default_oracles_count")]
    pub count: usize,

    /// Identity prefix; oracles are named `{prefix}-{n}`
    #[serde(default = "default_oracle_prefix")]
    pub prefix: String,

    /// Seed for the status policy; entropy when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_seed: Option<u64>,
}

impl Default for OracleFleetConfig {
    fn default() -> Self {
        Self {
            count: default_oracles_count(),
            prefix: default_oracle_prefix(),
            status_seed: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_owner() -> String {
    "owner".to_string()
}

fn default_first_airline() -> String {
    "airline-1".to_string()
}

fn default_first_airline_name() -> String {
    "Founder Air".to_string()
}

fn default_event_capacity() -> usize {
    1024
}

fn default_oracles_count() -> usize {
    20
}

fn default_oracle_prefix() -> String {
    "oracle".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RelayConfig {
    /// Load configuration from defaults, an optional file and `SURETY_*` variables
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&RelayConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // SURETY_ORACLES__COUNT=5 sets oracles.count
        builder = builder.add_source(
            config::Environment::with_prefix("SURETY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
