//! Oracle relay clients
//!
//! Each relay client is an independent task: it subscribes to the ledger's
//! event stream, keeps the `StatusRequested` events whose index one of its
//! oracles holds, and answers them through ordinary protocol operations.
//! Failures are logged and never retried.

use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use surety_core::{LedgerRuntime, OracleResponse, Submission};
use surety_types::{
    AccountId, Amount, EventPayload, FlightStatus, ProtocolEvent, SuretyResult,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::OracleFleetConfig;
use crate::error::RelayResult;

/// What a relay client needs from the ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Live registration fee.
    async fn registration_fee(&self) -> Amount;

    async fn register_oracle(&self, oracle: &AccountId, fee: Amount) -> SuretyResult<Vec<u8>>;

    async fn submit_response(
        &self,
        oracle: &AccountId,
        response: OracleResponse,
    ) -> SuretyResult<Submission>;

    fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent>;
}

#[async_trait]
impl LedgerClient for LedgerRuntime {
    async fn registration_fee(&self) -> Amount {
        self.query(|p| p.params().registration_fee).await
    }

    async fn register_oracle(&self, oracle: &AccountId, fee: Amount) -> SuretyResult<Vec<u8>> {
        self.execute(|p| p.register_oracle(oracle, fee)).await
    }

    async fn submit_response(
        &self,
        oracle: &AccountId,
        response: OracleResponse,
    ) -> SuretyResult<Submission> {
        self.execute(|p| p.submit_oracle_response(oracle, &response))
            .await
    }

    fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        LedgerRuntime::subscribe(self)
    }
}

/// A status request as seen by relay clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub index: u8,
    pub airline: AccountId,
    pub code: String,
    pub timestamp: u64,
}

impl StatusRequest {
    pub fn from_event(event: &ProtocolEvent) -> Option<Self> {
        match &event.payload {
            EventPayload::StatusRequested {
                index,
                airline,
                code,
                timestamp,
            } => Some(Self {
                index: *index,
                airline: airline.clone(),
                code: code.clone(),
                timestamp: *timestamp,
            }),
            _ => None,
        }
    }

    fn response(&self, status: FlightStatus) -> OracleResponse {
        OracleResponse {
            index: self.index,
            airline: self.airline.clone(),
            code: self.code.clone(),
            timestamp: self.timestamp,
            status,
        }
    }
}

/// Decides which status an oracle reports.
pub trait StatusPolicy: Send {
    fn status_for(&mut self, oracle: &AccountId, request: &StatusRequest) -> FlightStatus;
}

/// Uniform choice over every status code.
#[derive(Debug, Clone)]
pub struct RandomStatusPolicy {
    rng: StdRng,
}

impl RandomStatusPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl StatusPolicy for RandomStatusPolicy {
    fn status_for(&mut self, _oracle: &AccountId, _request: &StatusRequest) -> FlightStatus {
        FlightStatus::ALL[self.rng.gen_range(0..FlightStatus::ALL.len())]
    }
}

/// Every oracle reports the same status.
#[derive(Debug, Clone, Copy)]
pub struct FixedStatusPolicy(pub FlightStatus);

impl StatusPolicy for FixedStatusPolicy {
    fn status_for(&mut self, _oracle: &AccountId, _request: &StatusRequest) -> FlightStatus {
        self.0
    }
}

/// One registered oracle identity and its indexes.
#[derive(Debug, Clone)]
pub struct OracleClient {
    pub id: AccountId,
    pub indexes: Vec<u8>,
}

impl OracleClient {
    pub fn holds(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

/// The oracle identities one relay process answers for.
pub struct OracleFleet<C: LedgerClient> {
    client: Arc<C>,
    oracles: Vec<OracleClient>,
}

impl<C: LedgerClient + 'static> OracleFleet<C> {
    /// Register `config.count` oracles, paying the live fee for each.
    ///
    /// An oracle whose registration fails is logged and left out.
    pub async fn register(client: Arc<C>, config: &OracleFleetConfig) -> RelayResult<Self> {
        let fee = client.registration_fee().await;
        let mut oracles = Vec::with_capacity(config.count);

        for n in 0..config.count {
            let id = AccountId::new(format!("{}-{}", config.prefix, n));
            match client.register_oracle(&id, fee).await {
                Ok(indexes) => {
                    info!(oracle = %id, indexes = ?indexes, "Oracle registered");
                    oracles.push(OracleClient { id, indexes });
                }
                Err(err) => warn!(oracle = %id, error = %err, "Oracle registration failed"),
            }
        }

        Ok(Self { client, oracles })
    }

    pub fn oracles(&self) -> &[OracleClient] {
        &self.oracles
    }

    /// Answer `request` from every oracle holding its index.
    ///
    /// Returns the number of responses the ledger accepted.
    pub async fn answer(&self, request: &StatusRequest, policy: &mut dyn StatusPolicy) -> usize {
        let mut accepted = 0;
        for oracle in self.oracles.iter().filter(|o| o.holds(request.index)) {
            let status = policy.status_for(&oracle.id, request);
            match self
                .client
                .submit_response(&oracle.id, request.response(status))
                .await
            {
                Ok(submission) => {
                    accepted += 1;
                    debug!(oracle = %oracle.id, status = %status, ?submission, "Oracle response accepted");
                }
                Err(err) if err.is_droppable() => {
                    debug!(oracle = %oracle.id, error = %err, "Oracle response arrived late")
                }
                Err(err) => warn!(oracle = %oracle.id, error = %err, "Oracle response failed"),
            }
        }
        accepted
    }

    /// Answer status requests on a background task.
    ///
    /// The fleet's own ledger handle keeps the event stream open, so the task
    /// runs until the returned handle is aborted.
    pub fn spawn(self, mut policy: impl StatusPolicy + 'static) -> JoinHandle<()> {
        // Subscribe before spawning so no request emitted after this call is missed.
        let mut events = self.client.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Some(request) = StatusRequest::from_event(&event) {
                            let accepted = self.answer(&request, &mut policy).await;
                            info!(
                                index = request.index,
                                code = %request.code,
                                accepted,
                                "Status request answered"
                            );
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Relay fell behind the event stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Event stream closed; relay stopping");
        })
    }
}
