use std::sync::Arc;

use surety_types::ProtocolEvent;
use tokio::sync::{broadcast, Mutex};

use crate::protocol::FlightSuretyProtocol;

/// Shared handle that puts every operation into one total order.
///
/// Callers on any task submit closures; each runs with exclusive access to
/// the protocol, so an operation observes all operations ordered before it
/// and none after it.
#[derive(Clone)]
pub struct LedgerRuntime {
    protocol: Arc<Mutex<FlightSuretyProtocol>>,
    events: broadcast::Sender<ProtocolEvent>,
}

impl LedgerRuntime {
    pub fn new(protocol: FlightSuretyProtocol) -> Self {
        let events = protocol.event_sender();
        Self {
            protocol: Arc::new(Mutex::new(protocol)),
            events,
        }
    }

    /// Apply a mutating operation.
    pub async fn execute<T, F>(&self, operation: F) -> T
    where
        F: FnOnce(&mut FlightSuretyProtocol) -> T,
    {
        let mut protocol = self.protocol.lock().await;
        operation(&mut protocol)
    }

    /// Run a read against the current committed state.
    pub async fn query<T, F>(&self, read: F) -> T
    where
        F: FnOnce(&FlightSuretyProtocol) -> T,
    {
        let protocol = self.protocol.lock().await;
        read(&protocol)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.events.subscribe()
    }
}
