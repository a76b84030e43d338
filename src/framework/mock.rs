//! # Mock Framework
//!
//! Utilities for testing actors without real networking.
//!
//! - [`Probe`] is an actor recording every envelope it receives into a [`ProbeLog`].
//! - [`RecordingOutbound`] keeps every envelope a World tried to send to another process.
//! - [`MemoryNetwork`] connects several Worlds in memory, encoding every envelope to JSON
//!   and back exactly as the HTTP transport does.
//!
//! # Example
//! ```ignore
//! let (world, _) = World::start(ProcessInfo::new(1, "test"), WorldConfig::default(), Arc::new(Unroutable));
//! let log = ProbeLog::default();
//! let probe = world.spawn(|_| Probe::new(log.clone()))?;
//! world.send(probe, Ping);
//! let received = log.wait_for(1).await;
//! ```

use crate::framework::{
    Actor, ActorError, Context, Envelope, Message, MessageRegistry, RuntimeError, WireEnvelope,
    World,
};
use crate::transport::Outbound;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Shared record of the envelopes a [`Probe`] received.
#[derive(Clone, Default)]
pub struct ProbeLog {
    envelopes: Arc<Mutex<Vec<Envelope>>>,
}

impl ProbeLog {
    pub fn len(&self) -> usize {
        self.envelopes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.lock().is_empty()
    }

    pub fn envelopes(&self) -> Vec<Envelope> {
        self.envelopes.lock().clone()
    }

    /// The received messages of type `T`, in arrival order.
    pub fn messages<T: Message>(&self) -> Vec<T> {
        self.envelopes
            .lock()
            .iter()
            .filter_map(|envelope| envelope.message::<T>().cloned())
            .collect()
    }

    /// Waits until at least `count` envelopes were recorded. Wrap in a timeout.
    pub async fn wait_for(&self, count: usize) -> Vec<Envelope> {
        loop {
            {
                let envelopes = self.envelopes.lock();
                if envelopes.len() >= count {
                    return envelopes.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn record(&self, envelope: &Envelope) {
        self.envelopes.lock().push(envelope.clone());
    }
}

/// Actor recording everything it receives.
pub struct Probe {
    log: ProbeLog,
}

impl Probe {
    pub fn new(log: ProbeLog) -> Self {
        Self { log }
    }
}

impl Actor for Probe {
    fn process(&mut self, _ctx: &mut Context<'_>, envelope: &Envelope) -> Result<(), ActorError> {
        self.log.record(envelope);
        Ok(())
    }
}

/// Outbound keeping the envelopes instead of delivering them.
#[derive(Clone, Default)]
pub struct RecordingOutbound {
    sent: Arc<Mutex<Vec<(Envelope, bool)>>>,
}

impl RecordingOutbound {
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.sent.lock().iter().map(|(envelope, _)| envelope.clone()).collect()
    }

    /// The `retry` flag of each send, in order.
    pub fn retry_flags(&self) -> Vec<bool> {
        self.sent.lock().iter().map(|(_, retry)| *retry).collect()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl Outbound for RecordingOutbound {
    fn send(&self, _world: &World, envelope: Envelope, retry: bool) {
        self.sent.lock().push((envelope, retry));
    }
}

/// In-memory transport between Worlds.
///
/// Worlds must be created with the network as outbound, then [`MemoryNetwork::join`]ed.
pub struct MemoryNetwork {
    registry: Arc<MessageRegistry>,
    worlds: RwLock<HashMap<u64, World>>,
}

impl MemoryNetwork {
    pub fn new(registry: Arc<MessageRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            worlds: RwLock::new(HashMap::new()),
        })
    }

    pub fn join(&self, world: &World) {
        self.worlds.write().insert(world.process().id(), world.clone());
    }

    pub fn leave(&self, process_id: u64) {
        self.worlds.write().remove(&process_id);
    }
}

impl Outbound for MemoryNetwork {
    fn send(&self, world: &World, envelope: Envelope, _retry: bool) {
        let receiver = envelope.receiver();
        let Some(target) = self.worlds.read().get(&receiver.process_id()).cloned() else {
            warn!(%receiver, "Process not in the memory network");
            crate::transport::bounce(world, &envelope);
            return;
        };
        match through_the_wire(&envelope, &self.registry) {
            Ok(envelope) => {
                if let Err(e) = target.receive(envelope) {
                    warn!(%receiver, error = %e, "Envelope dropped");
                }
            }
            Err(e) => warn!(%receiver, error = %e, "Envelope does not survive the wire"),
        }
    }
}

fn through_the_wire(
    envelope: &Envelope,
    registry: &MessageRegistry,
) -> Result<Envelope, RuntimeError> {
    let bytes = serde_json::to_vec(&envelope.to_wire()?)?;
    serde_json::from_slice::<WireEnvelope>(&bytes)?.decode(registry)
}
