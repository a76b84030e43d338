//! Process assembly and lifecycle.
//!
//! - [`MeshConfig`] - TOML configuration of one node and its peers
//! - [`Node`] - Wires a World to HTTP inbound/outbound transports and shuts it down
//! - [`setup_tracing`] - Initializes the logging subscriber

pub mod config;
pub mod node;
pub mod tracing;

pub use config::*;
pub use node::*;
pub use tracing::*;
