//! # Supervision
//!
//! When an actor's `process` fails, its [`Supervisor`] decides what happens next. It can let the
//! actor carry on ([`HandleAction::Ignore`]) or take over the actor's message stream
//! ([`HandleAction::Attach`]). While attached, every envelope for the actor goes to
//! [`Supervisor::process`] instead, until the supervisor detaches or despawns the actor.
//!
//! Supervision only reroutes messages. Actors are never restarted.

use crate::framework::actor::{Actor, Context};
use crate::framework::address::ActorAddress;
use crate::framework::envelope::Envelope;
use crate::framework::error::ActorError;
use std::collections::VecDeque;
use tracing::error;

/// Decision taken by [`Supervisor::handle`] after a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleAction {
    /// Keep the actor alive and let it process the next envelope normally.
    Ignore,
    /// Take over the actor's message stream.
    Attach,
}

/// Decision taken by [`Supervisor::process`] for each envelope received while attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessAction {
    StayAttached,
    /// Give the message stream back to the actor and replay the stash.
    Detach,
    /// Detach, then let the actor process this envelope itself.
    Resume,
    /// Remove the actor for good.
    Despawn,
}

/// Envelopes held back by a supervisor while it is attached.
///
/// On detach they go back to the world's mailbox in the order they were stashed.
#[derive(Debug, Default)]
pub struct Stash {
    envelopes: VecDeque<Envelope>,
}

impl Stash {
    pub fn push(&mut self, envelope: Envelope) {
        self.envelopes.push_back(envelope);
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Envelope> + '_ {
        self.envelopes.drain(..)
    }
}

/// Per-actor fault policy.
pub trait Supervisor: Send {
    /// Called with the error `process` returned for `envelope`.
    fn handle(&mut self, error: &ActorError, envelope: &Envelope) -> HandleAction;

    /// Called once the actor has switched to the supervised state.
    fn attached(&mut self) {}

    /// Handles an envelope on the actor's behalf. `actor` may be used to run the actor's own
    /// `process`, which bypasses supervision for that call.
    fn process(
        &mut self,
        actor: &mut dyn Actor,
        ctx: &mut Context<'_>,
        envelope: &Envelope,
    ) -> ProcessAction;

    /// Called once the actor is alive again, before the stash is replayed.
    fn detached(&mut self) {}

    /// The envelopes to replay on detach, if this supervisor stashes any.
    fn stash(&mut self) -> Option<&mut Stash> {
        None
    }
}

/// Builds the supervisor of a freshly spawned actor.
pub type SupervisorFactory = Box<dyn FnOnce(ActorAddress) -> Box<dyn Supervisor> + Send>;

/// Logs the failure and attaches; the next envelope detaches and goes straight to the actor.
#[derive(Debug)]
pub struct DefaultSupervisor {
    address: ActorAddress,
}

impl DefaultSupervisor {
    pub fn new(address: ActorAddress) -> Self {
        Self { address }
    }
}

impl Supervisor for DefaultSupervisor {
    fn handle(&mut self, error: &ActorError, envelope: &Envelope) -> HandleAction {
        error!(
            address = %self.address,
            message = envelope.body().type_name(),
            %error,
            "Actor failed while processing envelope"
        );
        HandleAction::Attach
    }

    fn process(
        &mut self,
        _actor: &mut dyn Actor,
        _ctx: &mut Context<'_>,
        _envelope: &Envelope,
    ) -> ProcessAction {
        ProcessAction::Resume
    }
}
