//! Reliable delivery on top of best-effort messaging.
//!
//! The protocol has two halves:
//!
//! - [`AckRetryer`] (sender side) re-sends an acknowledgeable notification on a timer until a
//!   message carrying the same acknowledgment id comes back.
//! - [`AckStore`] (receiver side) remembers the outcome sent for each acknowledgment id, so a
//!   retried notification is answered with the same outcome instead of being handled twice.
//!
//! Together they give at-least-once delivery with an exactly-once effect.

pub mod retryer;
pub mod store;

pub use retryer::*;
pub use store::*;

use crate::framework::Message;

/// Client-generated correlation id of an acknowledgeable message.
pub type AckId = uuid::Uuid;

/// A message taking part in the acknowledgment protocol.
///
/// Implementors must also override [`Message::ack_id`] to return their id:
///
/// ```ignore
/// impl Message for Calculate {
///     const TYPE: &'static str = "calc.Calculate";
///     fn ack_id(&self) -> Option<AckId> {
///         Some(self.ack_id)
///     }
/// }
/// impl Acknowledgeable for Calculate {}
/// ```
pub trait Acknowledgeable: Message {}
