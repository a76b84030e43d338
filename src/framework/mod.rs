//! Actor runtime core.
//!
//! This module provides the building blocks of the runtime: addresses and messages, actors and
//! their supervisors, timers, and the World that schedules them.
//!
//! # Main Components
//!
//! - [`ActorAddress`] - `(process id, actor number)` identity with a hex string form
//! - [`Message`] - [`Notification`] / [`Request`] / [`Response`] contracts and type-erased [`Body`]
//! - [`Envelope`] - Unit placed on mailboxes and on the wire
//! - [`Actor`] / [`Context`] - Behavior and the primitives it can use
//! - [`Router`] - Per-actor-type dispatch table
//! - [`Supervisor`] - Fault policy taking over an actor after an error
//! - [`Timer`] - Cancelable delayed delivery
//! - [`World`] / [`Dispatcher`] - The process-local scheduler
//!
//! # Testing
//!
//! See [`mock`] module for a recording probe actor and in-memory transports.

pub mod actor;
pub mod address;
pub mod envelope;
pub mod error;
pub mod message;
pub mod mock;
pub mod process;
pub mod router;
pub mod supervisor;
pub mod timer;
pub mod world;

pub use actor::{Actor, ActorState, AsAny, Context, SpawnOptions};
pub use address::{ActorAddress, AddressParseError, WELL_KNOWN_MAX};
pub use envelope::{Envelope, WireEnvelope};
pub use error::{ActorError, ErrorKind, RuntimeError};
pub use message::{
    ActorNotFound, Body, Message, MessageKind, MessageRegistry, Notification, Request, Response,
    WireBody,
};
pub use process::ProcessInfo;
pub use router::Router;
pub use supervisor::{
    DefaultSupervisor, HandleAction, ProcessAction, Stash, Supervisor, SupervisorFactory,
};
pub use timer::Timer;
pub use world::{Dispatcher, Reply, World, WorldConfig};
