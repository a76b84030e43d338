//! # Actor Mesh
//!
//! > **Location-transparent actors spread over cooperating processes.**
//!
//! Every process hosts one [`World`](framework::World): a single-threaded scheduler that owns
//! its actors, delivers their messages one at a time and keeps track of the queries waiting
//! for an answer. Worlds talk to each other by posting JSON envelopes to `/mailbox` over HTTP,
//! so sending to an actor looks the same whether it lives next door or on another machine.
//!
//! ## 🚀 Core Concepts
//!
//! ### Addresses
//! An [`ActorAddress`](framework::ActorAddress) is `(process id, actor number)`. Numbers below
//! [`WELL_KNOWN_MAX`](framework::WELL_KNOWN_MAX) are reserved for singletons such as the demo
//! [`Greeter`](actors::Greeter), reachable on any process without discovery.
//!
//! ### Three kinds of messages
//! - **Notifications** are fire-and-forget.
//! - **Requests** expect a **Response**, correlated by a request id. A query that is never
//!   answered fails with a timeout; a query to a missing actor fails promptly with
//!   `ActorNotFound`.
//!
//! ### Single-threaded actors
//! An actor's [`process`](framework::Actor::process) is a plain synchronous function. The World
//! never runs two of them at once, so actor state needs no locks.
//!
//! ### Supervision
//! When `process` fails, the actor's [`Supervisor`](framework::Supervisor) decides whether to
//! take over its message stream until it recovers.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Reliable notifications
//! Delivery is best-effort. The [`reliable`] module adds retry-until-acknowledged on the sender
//! side and duplicate suppression on the receiver side.
//!
//! ### 2. Observability
//! `tracing` with structured fields everywhere; see [`runtime::setup_tracing`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`framework`])
//! Addresses, messages, envelopes, actors, routers, supervisors, timers and the World.
//!
//! ### 2. Reliability ([`reliable`])
//! [`AckRetryer`](reliable::AckRetryer) and [`AckStore`](reliable::AckStore).
//!
//! ### 3. The Wire ([`transport`])
//! Discovery view, the HTTP sender and the `/mailbox` server.
//!
//! ### 4. The Orchestrator ([`runtime`])
//! Configuration and the [`Node`](runtime::Node) that wires one process together.
//!
//! ### 5. Demo actors ([`actors`])
//! `Greeter` and `Calculator`, served by the `mesh-node` binary.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Two nodes that know each other
//! RUST_LOG=info cargo run -- --config config/node-a.toml
//! RUST_LOG=info cargo run -- --config config/node-b.toml
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod actors;
pub mod framework;
pub mod reliable;
pub mod runtime;
pub mod transport;
