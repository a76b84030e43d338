//! # Router
//!
//! A [`Router`] maps the concrete type of a message to a handler bound to an actor type. It
//! keeps two tables: request handlers, whose return value is sent back as the response, and
//! notification handlers. Messages without a handler are dropped.
//!
//! Routers are meant to be built once per actor type and shared:
//!
//! ```ignore
//! fn router() -> &'static Router<Calculator> {
//!     static ROUTER: OnceLock<Router<Calculator>> = OnceLock::new();
//!     ROUTER.get_or_init(|| Router::new().request(Calculator::double))
//! }
//!
//! impl Actor for Calculator {
//!     fn process(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) -> Result<(), ActorError> {
//!         router().dispatch(self, ctx, envelope)
//!     }
//! }
//! ```

use crate::framework::actor::{Actor, Context};
use crate::framework::envelope::Envelope;
use crate::framework::error::ActorError;
use crate::framework::message::{MessageKind, Notification, Request};
use std::any::TypeId;
use std::collections::HashMap;
use tracing::trace;

type Handler<A> =
    Box<dyn Fn(&mut A, &mut Context<'_>, &Envelope) -> Result<(), ActorError> + Send + Sync>;

pub struct Router<A> {
    requests: HashMap<TypeId, Handler<A>>,
    notifications: HashMap<TypeId, Handler<A>>,
}

impl<A: Actor> Default for Router<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Actor> Router<A> {
    pub fn new() -> Self {
        Self {
            requests: HashMap::new(),
            notifications: HashMap::new(),
        }
    }

    /// Registers the handler for request type `R`. Its result is sent back with `respond`,
    /// which does nothing for fire-and-forget requests.
    pub fn request<R, F>(mut self, handler: F) -> Self
    where
        R: Request,
        F: Fn(&mut A, &mut Context<'_>, &Envelope, &R) -> Result<R::Response, ActorError>
            + Send
            + Sync
            + 'static,
    {
        self.requests.insert(
            TypeId::of::<R>(),
            Box::new(
                move |actor: &mut A,
                      ctx: &mut Context<'_>,
                      envelope: &Envelope|
                      -> Result<(), ActorError> {
                    let Some(request) = envelope.message::<R>() else {
                        return Ok(());
                    };
                    let response = handler(actor, ctx, envelope, request)?;
                    ctx.respond(envelope, response);
                    Ok(())
                },
            ),
        );
        self
    }

    pub fn notification<N, F>(mut self, handler: F) -> Self
    where
        N: Notification,
        F: Fn(&mut A, &mut Context<'_>, &Envelope, &N) -> Result<(), ActorError>
            + Send
            + Sync
            + 'static,
    {
        self.notifications.insert(
            TypeId::of::<N>(),
            Box::new(
                move |actor: &mut A,
                      ctx: &mut Context<'_>,
                      envelope: &Envelope|
                      -> Result<(), ActorError> {
                    match envelope.message::<N>() {
                        Some(notification) => handler(actor, ctx, envelope, notification),
                        None => Ok(()),
                    }
                },
            ),
        );
        self
    }

    /// Runs the handler registered for the envelope's body, if any.
    pub fn dispatch(
        &self,
        actor: &mut A,
        ctx: &mut Context<'_>,
        envelope: &Envelope,
    ) -> Result<(), ActorError> {
        let body = envelope.body();
        let table = match body.kind() {
            MessageKind::Request => &self.requests,
            MessageKind::Notification => &self.notifications,
            MessageKind::Response => return Ok(()),
        };
        match table.get(&body.payload_type()) {
            Some(handler) => handler(actor, ctx, envelope),
            None => {
                trace!(address = %ctx.address(), message = body.type_name(), "No route");
                Ok(())
            }
        }
    }
}
