//! Demo actors served by `mesh-node` and used by the integration tests.
//!
//! Both live at well-known numbers so any process can reach them without discovery:
//! - [`Greeter`] at [`GREETER`]
//! - [`Calculator`] at [`CALCULATOR`]

pub mod calculator;
pub mod greeter;

pub use calculator::*;
pub use greeter::*;

use crate::framework::MessageRegistry;

pub const GREETER: u64 = 1;
pub const CALCULATOR: u64 = 2;

/// Registers every demo message with `registry` so it can be decoded off the wire.
pub fn register_messages(registry: &mut MessageRegistry) -> &mut MessageRegistry {
    registry
        .register_request::<Greet>()
        .register_response::<Greeting>()
        .register_request::<Double>()
        .register_response::<Doubled>()
        .register_request::<GetStats>()
        .register_response::<Stats>()
        .register_notification::<Calculate>()
        .register_notification::<CalculationDone>()
}
