//! # World
//!
//! The process-local scheduler. A [`World`] owns the mailbox, the actor registry and the
//! pending-request table; its [`Dispatcher`] is the single task that drains the mailbox and
//! runs actors, one envelope at a time, in arrival order.
//!
//! ## Architecture
//!
//! ```text
//!  World (cloneable handle)            Dispatcher (one task)
//!  ├─ spawn ───────┐                   ┌─ registers actors, calls `spawned`
//!  ├─ send/respond ├── Mail ──▶ mailbox├─ dispatches envelopes to actors
//!  ├─ query ───────┘   (unbounded)     ├─ completes pending requests
//!  │    └─ pending table (DashMap) ◀───┼─ sweeps expired requests
//!  └─ envelopes for other processes    └─ despawns every actor on shutdown
//!       └──▶ Outbound transport
//! ```
//!
//! Query completions always run on the dispatch task: an actor's reply callback is invoked
//! there with the actor borrowed mutably, exactly like `process`.

use crate::framework::actor::{Actor, ActorCell, Context, SpawnOptions};
use crate::framework::address::{ActorAddress, WELL_KNOWN_MAX};
use crate::framework::envelope::Envelope;
use crate::framework::error::RuntimeError;
use crate::framework::message::{ActorNotFound, Body, MessageKind, Notification, Request, Response};
use crate::framework::process::ProcessInfo;
use crate::framework::timer::{Timer, TimerSet};
use crate::transport::Outbound;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing knobs of a World.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// How long a query waits for its response.
    pub query_timeout_ms: u64,
    /// How often the pending-request table is swept for expired queries.
    pub sweep_interval_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 30_000,
            sweep_interval_ms: 1_000,
        }
    }
}

impl WorldConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

/// Callback receiving a query outcome on behalf of an actor.
pub(crate) type ReplyCallback =
    Box<dyn FnOnce(&mut dyn Actor, &mut Context<'_>, Result<Body, RuntimeError>) + Send>;

pub(crate) enum Completion {
    /// Query made outside any actor.
    Channel(oneshot::Sender<Result<Body, RuntimeError>>),
    /// Query made by a local actor.
    Actor(ReplyCallback),
}

struct PendingRequest {
    // Behind a lock only so the table stays `Sync`; it is taken exactly once.
    completion: Mutex<Completion>,
    deadline: Instant,
    /// Actor number of the requester, 0 for queries made outside any actor.
    requester: u64,
}

pub(crate) enum Mail {
    Envelope(Envelope),
    Spawn(Box<ActorCell>),
}

struct WorldShared {
    process: ProcessInfo,
    config: WorldConfig,
    mailbox: mpsc::UnboundedSender<Mail>,
    pending: DashMap<u64, PendingRequest>,
    reserved: DashSet<u64>,
    next_actor: AtomicU64,
    next_request: AtomicU64,
    next_timer: AtomicU64,
    outbound: Arc<dyn Outbound>,
    token: CancellationToken,
}

/// Cloneable handle to a process-local World.
#[derive(Clone)]
pub struct World {
    shared: Arc<WorldShared>,
}

impl World {
    /// Creates a World and the dispatcher that drives it. Nothing runs until
    /// [`Dispatcher::run`] is polled.
    pub fn new(
        process: ProcessInfo,
        config: WorldConfig,
        outbound: Arc<dyn Outbound>,
    ) -> (World, Dispatcher) {
        let (mailbox, receiver) = mpsc::unbounded_channel();
        let world = World {
            shared: Arc::new(WorldShared {
                process,
                config,
                mailbox,
                pending: DashMap::new(),
                reserved: DashSet::new(),
                next_actor: AtomicU64::new(WELL_KNOWN_MAX),
                next_request: AtomicU64::new(1),
                next_timer: AtomicU64::new(1),
                outbound,
                token: CancellationToken::new(),
            }),
        };
        let dispatcher = Dispatcher {
            world: world.clone(),
            mailbox: receiver,
            actors: HashMap::new(),
        };
        (world, dispatcher)
    }

    /// Creates a World and spawns its dispatcher on the current tokio runtime.
    pub fn start(
        process: ProcessInfo,
        config: WorldConfig,
        outbound: Arc<dyn Outbound>,
    ) -> (World, JoinHandle<()>) {
        let (world, dispatcher) = World::new(process, config, outbound);
        (world, tokio::spawn(dispatcher.run()))
    }

    pub fn process(&self) -> &ProcessInfo {
        &self.shared.process
    }

    /// The address of the process itself, used as sender of queries made outside actors.
    pub fn address(&self) -> ActorAddress {
        ActorAddress::process(self.shared.process.id())
    }

    pub fn config(&self) -> &WorldConfig {
        &self.shared.config
    }

    /// Stops the dispatcher. Actors still registered are despawned without receiving
    /// anything else, and pending queries fail with [`RuntimeError::WorldStopped`].
    pub fn shutdown(&self) {
        self.shared.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// Resolves once [`World::shutdown`] has been called.
    pub async fn stopped(&self) {
        self.shared.token.cancelled().await
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.shared.token.clone()
    }

    /// Number of queries still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn spawn<A, F>(&self, factory: F) -> Result<ActorAddress, RuntimeError>
    where
        A: Actor,
        F: FnOnce(ActorAddress) -> A,
    {
        self.spawn_with(factory, SpawnOptions::default())
    }

    /// Reserves an address, builds the actor with `factory` and queues its registration.
    ///
    /// The address is returned right away; envelopes sent to it afterwards are delivered
    /// after `spawned` has run.
    pub fn spawn_with<A, F>(
        &self,
        factory: F,
        options: SpawnOptions,
    ) -> Result<ActorAddress, RuntimeError>
    where
        A: Actor,
        F: FnOnce(ActorAddress) -> A,
    {
        if self.is_stopped() {
            return Err(RuntimeError::WorldStopped);
        }
        let number = self.reserve(options.fixed_number())?;
        let address = self.shared.process.actor(number);
        let supervisor = options.build_supervisor(address);
        let cell = ActorCell::new(address, Box::new(factory(address)), supervisor);
        self.shared
            .mailbox
            .send(Mail::Spawn(Box::new(cell)))
            .map_err(|_| RuntimeError::WorldStopped)?;
        debug!(%address, "Spawn queued");
        Ok(address)
    }

    fn reserve(&self, number: Option<u64>) -> Result<u64, RuntimeError> {
        match number {
            Some(number) if number == 0 || number >= WELL_KNOWN_MAX => {
                Err(RuntimeError::InvalidActorNumber(number))
            }
            // Never released, so a despawned well-known address is not handed out again.
            Some(number) if !self.shared.reserved.insert(number) => {
                Err(RuntimeError::DuplicateActorNumber(number))
            }
            Some(number) => Ok(number),
            None => Ok(self.shared.next_actor.fetch_add(1, Ordering::Relaxed)),
        }
    }

    /// Sends a notification on behalf of the process.
    pub fn send<N: Notification>(&self, receiver: ActorAddress, message: N) {
        let envelope = Envelope::new(Some(self.address()), receiver, 0, Body::notification(message));
        self.route(envelope, true);
    }

    /// Sends a request on behalf of the process, without waiting for a response.
    pub fn send_request<R: Request>(&self, receiver: ActorAddress, message: R) {
        let envelope = Envelope::new(Some(self.address()), receiver, 0, Body::request(message));
        self.route(envelope, true);
    }

    /// Sends a request on behalf of the process and returns a future of its response.
    ///
    /// The future fails with [`RuntimeError::Timeout`] after the configured query timeout,
    /// and with [`RuntimeError::ActorNotFound`] as soon as the receiving process reports it
    /// does not host `receiver`.
    pub fn query<R: Request>(&self, receiver: ActorAddress, request: R) -> Reply<R::Response> {
        self.ask(receiver, request, true)
    }

    /// Blocking variant of [`World::query`] for code running outside the tokio runtime.
    ///
    /// Unlike `query`, the transport does not retry resolving the receiving process, so an
    /// unknown process fails fast with [`RuntimeError::ActorNotFound`]. Panics if called from
    /// within an async context.
    pub fn query_blocking<R: Request>(
        &self,
        receiver: ActorAddress,
        request: R,
    ) -> Result<R::Response, RuntimeError> {
        self.ask(receiver, request, false).blocking()
    }

    fn ask<R: Request>(&self, receiver: ActorAddress, request: R, retry: bool) -> Reply<R::Response> {
        let (sender, receiver_half) = oneshot::channel();
        if !self.is_stopped() {
            self.request(
                self.address(),
                receiver,
                Body::request(request),
                Completion::Channel(sender),
                retry,
            );
        }
        Reply::new(receiver_half)
    }

    /// Pushes an envelope onto the mailbox, whatever its origin.
    pub fn receive(&self, envelope: Envelope) -> Result<(), RuntimeError> {
        self.shared
            .mailbox
            .send(Mail::Envelope(envelope))
            .map_err(|_| RuntimeError::WorldStopped)
    }

    /// Delivers locally or hands the envelope to the outbound transport.
    pub(crate) fn route(&self, envelope: Envelope, retry: bool) {
        if envelope.receiver().process_id() != self.shared.process.id() {
            self.shared.outbound.send(self, envelope, retry);
            return;
        }
        let request_id = envelope.request_id();
        if self.receive(envelope).is_err() {
            debug!(request_id, "World stopped, envelope dropped");
            if request_id != 0 {
                self.shared.pending.remove(&request_id);
            }
        }
    }

    /// Registers a pending request and sends it. Returns the request id.
    pub(crate) fn request(
        &self,
        sender: ActorAddress,
        receiver: ActorAddress,
        body: Body,
        completion: Completion,
        retry: bool,
    ) -> u64 {
        let request_id = self.shared.next_request.fetch_add(1, Ordering::Relaxed);
        self.shared.pending.insert(
            request_id,
            PendingRequest {
                completion: Mutex::new(completion),
                deadline: Instant::now() + self.shared.config.query_timeout(),
                requester: sender.actor_number(),
            },
        );
        debug!(request_id, %sender, %receiver, message = body.type_name(), "Query sent");
        self.route(Envelope::new(Some(sender), receiver, request_id, body), retry);
        request_id
    }

    /// Answers the request carried by `envelope`, if there is one.
    pub(crate) fn respond(&self, responder: Option<ActorAddress>, envelope: &Envelope, body: Body) {
        if !envelope.expects_reply() {
            return;
        }
        let Some(sender) = envelope.sender() else {
            warn!(
                request_id = envelope.request_id(),
                "Cannot respond to an envelope without sender"
            );
            return;
        };
        let response = Envelope::new(
            responder,
            ActorAddress::process(sender.process_id()),
            envelope.request_id(),
            body,
        );
        self.route(response, true);
    }

    /// Routes `envelope` after `delay` unless the returned timer is cancelled first.
    pub(crate) fn schedule(&self, timers: &TimerSet, envelope: Envelope, delay: Duration) -> Timer {
        let id = self.shared.next_timer.fetch_add(1, Ordering::Relaxed);
        let timer = timers.create(id);
        let fire = timer.clone();
        let world = self.clone();
        let task = tokio::spawn(async move {
            time::sleep(delay).await;
            if fire.try_fire() {
                world.route(envelope, true);
            }
        });
        timer.attach(task.abort_handle());
        timer
    }
}

/// Future of a query response.
#[must_use = "a query does nothing useful unless its reply is awaited"]
pub struct Reply<T> {
    receiver: oneshot::Receiver<Result<Body, RuntimeError>>,
    _response: PhantomData<fn() -> T>,
}

impl<T: Response> Reply<T> {
    fn new(receiver: oneshot::Receiver<Result<Body, RuntimeError>>) -> Self {
        Self {
            receiver,
            _response: PhantomData,
        }
    }

    fn blocking(self) -> Result<T, RuntimeError> {
        self.receiver
            .blocking_recv()
            .map_err(|_| RuntimeError::WorldStopped)?
            .and_then(Body::into_response)
    }
}

impl<T: Response> Future for Reply<T> {
    type Output = Result<T, RuntimeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result.and_then(Body::into_response)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RuntimeError::WorldStopped)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// The dispatch loop of a [`World`].
pub struct Dispatcher {
    world: World,
    mailbox: mpsc::UnboundedReceiver<Mail>,
    actors: HashMap<u64, ActorCell>,
}

impl Dispatcher {
    /// Runs until the World is shut down.
    pub async fn run(mut self) {
        let token = self.world.token();
        let mut sweep = time::interval(self.world.config().sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            process = %self.world.process().id_string(),
            app = self.world.process().app_name(),
            "World started"
        );

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sweep.tick() => self.sweep(),
                mail = self.mailbox.recv() => match mail {
                    Some(Mail::Envelope(envelope)) => self.dispatch(envelope),
                    Some(Mail::Spawn(cell)) => self.register(*cell),
                    None => break,
                },
            }
        }

        self.stop();
    }

    fn register(&mut self, mut cell: ActorCell) {
        let address = cell.address();
        let number = address.actor_number();
        let despawn = cell.start(&self.world);
        info!(%address, "Actor spawned");
        self.actors.insert(number, cell);
        if despawn {
            self.despawn(number);
        }
    }

    fn dispatch(&mut self, envelope: Envelope) {
        let receiver = envelope.receiver();
        if receiver.process_id() != self.world.process().id() {
            warn!(
                %receiver,
                local = %self.world.process().id_string(),
                "Dropping envelope addressed to another process"
            );
            return;
        }

        if receiver.is_process() {
            if envelope.body().kind() != MessageKind::Response {
                warn!(message = envelope.body().type_name(), "Dropping non-response sent to the process");
                return;
            }
            self.complete(envelope.request_id(), Ok(envelope.body().clone()));
            return;
        }

        let number = receiver.actor_number();
        let Some(cell) = self.actors.get_mut(&number) else {
            warn!(
                %receiver,
                request_id = envelope.request_id(),
                message = envelope.body().type_name(),
                "No actor found for envelope"
            );
            let world = &self.world;
            world.respond(
                Some(world.address()),
                &envelope,
                Body::response(ActorNotFound { address: receiver }),
            );
            return;
        };
        assert!(
            cell.state().is_active(),
            "actor {receiver} is registered while {:?}",
            cell.state()
        );

        debug!(
            %receiver,
            request_id = envelope.request_id(),
            message = envelope.body().type_name(),
            "Dispatching"
        );
        let world = &self.world;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| cell.accept_envelope(world, &envelope)));
        match outcome {
            Ok(true) => self.despawn(number),
            Ok(false) => {}
            Err(panic) => error!(
                %receiver,
                message = envelope.body().type_name(),
                panic = panic_message(&*panic),
                "Actor panicked while processing envelope"
            ),
        }
    }

    fn complete(&mut self, request_id: u64, result: Result<Body, RuntimeError>) {
        let Some((_, pending)) = self.world.shared.pending.remove(&request_id) else {
            warn!(request_id, "Response for unknown request");
            return;
        };
        match pending.completion.into_inner() {
            Completion::Channel(sender) => {
                let _ = sender.send(result);
            }
            Completion::Actor(callback) => {
                let requester = pending.requester;
                let Some(cell) = self.actors.get_mut(&requester) else {
                    info!(request_id, requester, "Requester is gone, dropping response");
                    return;
                };
                let world = &self.world;
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| cell.complete(world, callback, result)));
                match outcome {
                    Ok(true) => self.despawn(requester),
                    Ok(false) => {}
                    Err(panic) => error!(
                        request_id,
                        requester,
                        panic = panic_message(&*panic),
                        "Actor panicked while handling a reply"
                    ),
                }
            }
        }
    }

    /// Fails every expired query with a timeout.
    fn sweep(&mut self) {
        let now = Instant::now();
        let expired: Vec<u64> = self
            .world
            .shared
            .pending
            .iter()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| *entry.key())
            .collect();
        for request_id in expired {
            debug!(request_id, "Query timed out");
            self.complete(request_id, Err(RuntimeError::Timeout { request_id }));
        }
    }

    fn despawn(&mut self, number: u64) {
        if let Some(mut cell) = self.actors.remove(&number) {
            cell.stop(&self.world);
        }
    }

    fn stop(&mut self) {
        self.mailbox.close();
        let numbers: Vec<u64> = self.actors.keys().copied().collect();
        let despawned = numbers.len();
        for number in numbers {
            self.despawn(number);
        }
        // Dropping the completions fails every waiting query with `WorldStopped`.
        self.world.shared.pending.clear();
        info!(despawned, "World stopped");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Unroutable;

    fn world() -> World {
        World::new(
            ProcessInfo::new(7, "test"),
            WorldConfig::default(),
            Arc::new(Unroutable),
        )
        .0
    }

    #[test]
    fn well_known_numbers_are_reserved_once() {
        let world = world();
        assert_eq!(world.reserve(Some(5)).unwrap(), 5);
        assert!(matches!(
            world.reserve(Some(5)),
            Err(RuntimeError::DuplicateActorNumber(5))
        ));
        assert!(matches!(
            world.reserve(Some(0)),
            Err(RuntimeError::InvalidActorNumber(0))
        ));
        assert!(matches!(
            world.reserve(Some(WELL_KNOWN_MAX)),
            Err(RuntimeError::InvalidActorNumber(_))
        ));
    }

    #[test]
    fn generated_numbers_start_above_the_well_known_range() {
        let world = world();
        let first = world.reserve(None).unwrap();
        let second = world.reserve(None).unwrap();
        assert_eq!(first, WELL_KNOWN_MAX);
        assert_eq!(second, WELL_KNOWN_MAX + 1);
    }

    #[test]
    fn config_defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.query_timeout(), Duration::from_secs(30));
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
        let zero = WorldConfig {
            sweep_interval_ms: 0,
            ..WorldConfig::default()
        };
        assert_eq!(zero.sweep_interval(), Duration::from_millis(1));
    }
}
