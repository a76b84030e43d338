//! # Actors
//!
//! An actor is an addressable unit of sequential behavior. Implementations provide
//! [`Actor::process`], called once per inbound envelope, and optionally the
//! [`Actor::spawned`] / [`Actor::despawned`] lifecycle hooks.
//!
//! ## Lifecycle
//!
//! ```text
//! Detached ──spawn──▶ Alive ◀──detach── Supervised
//!                       │  ──attach──▶     │
//!                       └──despawn──▶ Dead ◀┘
//! ```
//!
//! Every hook runs on the owning World's dispatch task, one at a time, so actors hold their
//! state without locks. A hook must never block: doing so stalls every actor of the World.
//!
//! ## Context
//!
//! Hooks receive a [`Context`] giving access to the messaging primitives (`send`, `query`,
//! `respond`, `send_delayed`) and to lifecycle control (`spawn`, `despawn`).

use crate::framework::address::ActorAddress;
use crate::framework::envelope::Envelope;
use crate::framework::error::{ActorError, RuntimeError};
use crate::framework::message::{Body, Notification, Request, Response};
use crate::framework::supervisor::{
    DefaultSupervisor, HandleAction, ProcessAction, Supervisor, SupervisorFactory,
};
use crate::framework::timer::{Timer, TimerSet};
use crate::framework::world::{Completion, ReplyCallback, World};
use std::any::Any;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActorState {
    /// Constructed but not yet registered with its World.
    Detached,
    Alive,
    /// A supervisor has taken over the actor's message stream.
    Supervised,
    /// Removed from its World. Terminal.
    Dead,
}

impl ActorState {
    /// True while the actor is registered and receives envelopes.
    pub fn is_active(&self) -> bool {
        matches!(self, ActorState::Alive | ActorState::Supervised)
    }
}

/// Upcast to [`Any`], used to hand replies back to the concrete actor type.
pub trait AsAny: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The base unit of behavior.
pub trait Actor: AsAny + Send + 'static {
    /// Called once, right after the actor becomes alive.
    fn spawned(&mut self, _ctx: &mut Context<'_>) {}

    /// Called once, after the actor has been removed and its timers cancelled.
    fn despawned(&mut self, _ctx: &mut Context<'_>) {}

    /// Handles one envelope. Errors are handed to the actor's supervisor.
    fn process(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) -> Result<(), ActorError>;
}

/// Options accepted by [`World::spawn_with`].
#[derive(Default)]
pub struct SpawnOptions {
    number: Option<u64>,
    supervisor: Option<SupervisorFactory>,
}

impl SpawnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the actor under a fixed number from the well-known range.
    pub fn well_known(number: u64) -> Self {
        Self::new().number(number)
    }

    pub fn number(mut self, number: u64) -> Self {
        self.number = Some(number);
        self
    }

    pub fn supervisor<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(ActorAddress) -> Box<dyn Supervisor> + Send + 'static,
    {
        self.supervisor = Some(Box::new(factory));
        self
    }

    pub(crate) fn fixed_number(&self) -> Option<u64> {
        self.number
    }

    pub(crate) fn build_supervisor(self, address: ActorAddress) -> Box<dyn Supervisor> {
        match self.supervisor {
            Some(factory) => factory(address),
            None => Box::new(DefaultSupervisor::new(address)),
        }
    }
}

/// Handle given to actor hooks for talking to the rest of the world.
pub struct Context<'a> {
    world: &'a World,
    address: ActorAddress,
    state: ActorState,
    timers: TimerSet,
    despawn: bool,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        world: &'a World,
        address: ActorAddress,
        state: ActorState,
        timers: TimerSet,
    ) -> Self {
        Self {
            world,
            address,
            state,
            timers,
            despawn: false,
        }
    }

    pub fn address(&self) -> ActorAddress {
        self.address
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    pub fn world(&self) -> &'a World {
        self.world
    }

    /// Sends a notification. Delivery is best effort.
    pub fn send<N: Notification>(&self, receiver: ActorAddress, message: N) {
        self.send_body(receiver, Body::notification(message));
    }

    /// Sends a request without waiting for (or receiving) any response.
    pub fn send_request<R: Request>(&self, receiver: ActorAddress, message: R) {
        self.send_body(receiver, Body::request(message));
    }

    pub(crate) fn send_body(&self, receiver: ActorAddress, body: Body) {
        self.world
            .route(Envelope::new(Some(self.address), receiver, 0, body), true);
    }

    /// Sends a request and calls `on_reply` with the outcome.
    ///
    /// `on_reply` runs on the dispatch task like any other hook, with the actor borrowed
    /// mutably. It receives [`RuntimeError::Timeout`] when no response arrived in time and
    /// [`RuntimeError::ActorNotFound`] when the receiving process does not host `receiver`.
    /// If the actor is despawned first, `on_reply` is dropped without being called.
    ///
    /// Returns the request id.
    pub fn query<A, R, F>(&self, receiver: ActorAddress, request: R, on_reply: F) -> u64
    where
        A: Actor,
        R: Request,
        F: FnOnce(&mut A, &mut Context<'_>, Result<R::Response, RuntimeError>) + Send + 'static,
    {
        let callback: ReplyCallback = Box::new(
            move |actor: &mut dyn Actor,
                  ctx: &mut Context<'_>,
                  result: Result<Body, RuntimeError>| {
                match AsAny::as_any_mut(actor).downcast_mut::<A>() {
                    Some(actor) => {
                        on_reply(actor, ctx, result.and_then(Body::into_response::<R::Response>))
                    }
                    None => warn!(
                        address = %ctx.address(),
                        expected = std::any::type_name::<A>(),
                        "Reply callback registered for another actor type"
                    ),
                }
            },
        );
        self.world.request(
            self.address,
            receiver,
            Body::request(request),
            Completion::Actor(callback),
            true,
        )
    }

    /// Answers the request carried by `envelope`. Does nothing when `envelope` is not part of
    /// a request/response conversation.
    pub fn respond<T: Response>(&self, envelope: &Envelope, response: T) {
        self.world
            .respond(Some(self.address), envelope, Body::response(response));
    }

    /// Delivers `message` to `receiver` after `delay`.
    ///
    /// Fails unless the actor is alive. The timer is cancelled automatically when the actor
    /// is despawned.
    pub fn send_delayed<N: Notification>(
        &self,
        receiver: ActorAddress,
        message: N,
        delay: Duration,
    ) -> Result<Timer, RuntimeError> {
        if self.state != ActorState::Alive {
            return Err(RuntimeError::ActorNotAlive {
                address: self.address,
                state: self.state,
            });
        }
        let envelope = Envelope::new(
            Some(self.address),
            receiver,
            0,
            Body::notification(message),
        );
        Ok(self.world.schedule(&self.timers, envelope, delay))
    }

    /// Cancels a timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&self, timer: &Timer) -> bool {
        timer.cancel()
    }

    pub fn spawn<A, F>(&self, factory: F, options: SpawnOptions) -> Result<ActorAddress, RuntimeError>
    where
        A: Actor,
        F: FnOnce(ActorAddress) -> A,
    {
        self.world.spawn_with(factory, options)
    }

    /// Removes this actor once the current hook returns.
    pub fn despawn(&mut self) {
        self.despawn = true;
    }

    pub(crate) fn despawn_requested(&self) -> bool {
        self.despawn
    }
}

/// Runtime-owned wrapper around an actor: identity, state, supervisor and timers.
pub(crate) struct ActorCell {
    address: ActorAddress,
    actor: Box<dyn Actor>,
    supervisor: Box<dyn Supervisor>,
    state: ActorState,
    timers: TimerSet,
}

impl ActorCell {
    pub(crate) fn new(
        address: ActorAddress,
        actor: Box<dyn Actor>,
        supervisor: Box<dyn Supervisor>,
    ) -> Self {
        Self {
            address,
            actor,
            supervisor,
            state: ActorState::Detached,
            timers: TimerSet::default(),
        }
    }

    pub(crate) fn address(&self) -> ActorAddress {
        self.address
    }

    pub(crate) fn state(&self) -> ActorState {
        self.state
    }

    fn context<'w>(&self, world: &'w World) -> Context<'w> {
        Context::new(world, self.address, self.state, self.timers.clone())
    }

    /// Makes the actor alive. Returns true if it asked to be despawned.
    pub(crate) fn start(&mut self, world: &World) -> bool {
        assert_eq!(
            self.state,
            ActorState::Detached,
            "actor {} started twice",
            self.address
        );
        self.state = ActorState::Alive;
        let mut ctx = self.context(world);
        self.actor.spawned(&mut ctx);
        ctx.despawn_requested()
    }

    /// Runs one envelope through the actor or its supervisor. Returns true if the actor must
    /// be despawned.
    pub(crate) fn accept_envelope(&mut self, world: &World, envelope: &Envelope) -> bool {
        match self.state {
            ActorState::Alive => {
                let mut ctx = self.context(world);
                if let Err(error) = self.actor.process(&mut ctx, envelope) {
                    match self.supervisor.handle(&error, envelope) {
                        HandleAction::Ignore => {
                            debug!(address = %self.address, "Supervisor ignored failure")
                        }
                        HandleAction::Attach => {
                            self.state = ActorState::Supervised;
                            self.supervisor.attached();
                            info!(address = %self.address, "Supervisor attached");
                        }
                    }
                }
                ctx.despawn_requested()
            }
            ActorState::Supervised => {
                let mut ctx = self.context(world);
                match self
                    .supervisor
                    .process(&mut *self.actor, &mut ctx, envelope)
                {
                    ProcessAction::StayAttached => ctx.despawn_requested(),
                    ProcessAction::Detach => {
                        self.detach(world);
                        ctx.despawn_requested()
                    }
                    ProcessAction::Resume => {
                        self.detach(world);
                        let despawn = ctx.despawn_requested();
                        self.accept_envelope(world, envelope) || despawn
                    }
                    ProcessAction::Despawn => {
                        info!(address = %self.address, "Supervisor despawned actor");
                        true
                    }
                }
            }
            ActorState::Detached | ActorState::Dead => panic!(
                "actor {} received an envelope while {:?}",
                self.address, self.state
            ),
        }
    }

    /// Gives the message stream back to the actor and replays the supervisor's stash.
    fn detach(&mut self, world: &World) {
        self.state = ActorState::Alive;
        self.supervisor.detached();
        let mut replayed = 0;
        if let Some(stash) = self.supervisor.stash() {
            for stashed in stash.drain() {
                if let Err(e) = world.receive(stashed) {
                    warn!(address = %self.address, error = %e, "Stashed envelope lost");
                }
                replayed += 1;
            }
        }
        info!(address = %self.address, replayed, "Supervisor detached");
    }

    /// Hands a query outcome to the actor. Returns true if the actor must be despawned.
    pub(crate) fn complete(
        &mut self,
        world: &World,
        callback: ReplyCallback,
        result: Result<Body, RuntimeError>,
    ) -> bool {
        let mut ctx = self.context(world);
        callback(&mut *self.actor, &mut ctx, result);
        ctx.despawn_requested()
    }

    /// Moves the actor to `Dead`, cancelling its timers before `despawned` runs.
    pub(crate) fn stop(&mut self, world: &World) {
        self.state = ActorState::Dead;
        let cancelled_timers = self.timers.cancel_all();
        let mut ctx = self.context(world);
        self.actor.despawned(&mut ctx);
        info!(address = %self.address, cancelled_timers, "Actor despawned");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_alive_and_supervised_are_active() {
        assert!(!ActorState::Detached.is_active());
        assert!(ActorState::Alive.is_active());
        assert!(ActorState::Supervised.is_active());
        assert!(!ActorState::Dead.is_active());
    }

    #[test]
    fn spawn_options_carry_fixed_number() {
        assert_eq!(SpawnOptions::well_known(3).fixed_number(), Some(3));
        assert_eq!(SpawnOptions::new().fixed_number(), None);
    }
}
