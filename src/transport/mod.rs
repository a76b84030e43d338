//! Cross-process delivery over HTTP.
//!
//! - [`registry`] - Process discovery read model and the per-process [`Network`] view
//! - [`outbound`] - [`Outbound`] trait and the HTTP sender posting to `/mailbox`
//! - [`inbound`] - The `/mailbox` endpoint feeding the local World

pub mod inbound;
pub mod outbound;
pub mod registry;

pub use inbound::*;
pub use outbound::*;
pub use registry::*;
