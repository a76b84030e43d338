//! # Outbound Delivery
//!
//! Envelopes addressed to another process go through an [`Outbound`]. The HTTP
//! implementation, [`HttpSender`], resolves the target process through the [`Network`],
//! retrying resolution a bounded number of times, then POSTs the JSON envelope to
//! `{url}/mailbox`. Failures are logged and the envelope is dropped: reliability is the job
//! of the acknowledgment layer, not of the transport.

use crate::framework::{
    ActorNotFound, Body, Envelope, MessageKind, RuntimeError, WireEnvelope, World,
};
use crate::transport::Network;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

/// Where envelopes for other processes go.
pub trait Outbound: Send + Sync {
    /// Delivers `envelope` in the background. `retry` allows retrying the resolution of the
    /// receiving process. `world` is the sending World.
    fn send(&self, world: &World, envelope: Envelope, retry: bool);
}

/// Answers a request whose process cannot be reached with `ActorNotFound`, so the query
/// fails right away instead of timing out.
pub(crate) fn bounce(world: &World, request: &Envelope) {
    if request.body().kind() != MessageKind::Request || !request.expects_reply() {
        return;
    }
    let not_found = Envelope::new(
        None,
        world.address(),
        request.request_id(),
        Body::response(ActorNotFound {
            address: request.receiver(),
        }),
    );
    if world.receive(not_found).is_err() {
        debug!(request_id = request.request_id(), "World stopped, bounce dropped");
    }
}

/// Outbound of a World that cannot reach any other process.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unroutable;

impl Outbound for Unroutable {
    fn send(&self, world: &World, envelope: Envelope, _retry: bool) {
        warn!(
            receiver = %envelope.receiver(),
            message = envelope.body().type_name(),
            "No transport, envelope dropped"
        );
        bounce(world, &envelope);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Resolution attempts before an envelope is dropped.
    pub resolve_attempts: u32,
    pub resolve_retry_delay_ms: u64,
    /// Timeout of one HTTP POST.
    pub request_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            resolve_attempts: 10,
            resolve_retry_delay_ms: 1_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl TransportConfig {
    pub fn resolve_retry_delay(&self) -> Duration {
        Duration::from_millis(self.resolve_retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("process {0:016x} could not be resolved")]
    Unresolved(u64),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered {status}")]
    Rejected { url: String, status: u16 },
    #[error("cannot encode envelope: {0}")]
    Encoding(#[from] RuntimeError),
}

/// Posts one wire envelope to the mailbox of a process.
#[async_trait]
pub trait Courier: Send + Sync {
    async fn post(&self, url: &str, envelope: &WireEnvelope) -> Result<(), DeliveryError>;
}

pub struct ReqwestCourier {
    client: reqwest::Client,
}

impl ReqwestCourier {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Courier for ReqwestCourier {
    async fn post(&self, url: &str, envelope: &WireEnvelope) -> Result<(), DeliveryError> {
        let mailbox = format!("{}/mailbox", url.trim_end_matches('/'));
        let response = self.client.post(&mailbox).json(envelope).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                url: mailbox,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

pub struct HttpSender {
    network: Arc<Network>,
    courier: Arc<dyn Courier>,
    config: TransportConfig,
    runtime: Handle,
}

impl HttpSender {
    /// Must be created from within a tokio runtime; deliveries are spawned on it.
    pub fn new(network: Arc<Network>, courier: Arc<dyn Courier>, config: TransportConfig) -> Self {
        Self {
            network,
            courier,
            config,
            runtime: Handle::current(),
        }
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }
}

impl Outbound for HttpSender {
    fn send(&self, world: &World, envelope: Envelope, retry: bool) {
        let wire = match envelope.to_wire() {
            Ok(wire) => wire,
            Err(error) => {
                error!(receiver = %envelope.receiver(), %error, "Cannot encode envelope");
                return;
            }
        };
        let attempts = if retry {
            self.config.resolve_attempts.max(1)
        } else {
            1
        };
        let network = Arc::clone(&self.network);
        let courier = Arc::clone(&self.courier);
        let retry_delay = self.config.resolve_retry_delay();
        let world = world.clone();

        self.runtime.spawn(async move {
            let process_id = wire.receiver.process_id();
            let result = match resolve(&network, process_id, attempts, retry_delay).await {
                Some(url) => courier.post(&url, &wire).await,
                None => {
                    bounce(&world, &envelope);
                    Err(DeliveryError::Unresolved(process_id))
                }
            };
            match result {
                Ok(()) => debug!(
                    receiver = %wire.receiver,
                    request_id = wire.request_id,
                    message = %wire.body.type_name,
                    "Delivered"
                ),
                Err(error) => error!(
                    receiver = %wire.receiver,
                    request_id = wire.request_id,
                    message = %wire.body.type_name,
                    %error,
                    "Delivery failed, envelope dropped"
                ),
            }
        });
    }
}

async fn resolve(
    network: &Network,
    process_id: u64,
    attempts: u32,
    retry_delay: Duration,
) -> Option<String> {
    for attempt in 1..=attempts {
        if let Some(url) = network.resolve(process_id) {
            return Some(url);
        }
        if attempt < attempts {
            let process = format!("{process_id:016x}");
            warn!(%process, attempt, attempts, "Process not resolved, retrying");
            tokio::time::sleep(retry_delay).await;
        }
    }
    None
}
