//! # Messages
//!
//! Messages come in three disjoint kinds:
//!
//! - [`Notification`]: fire-and-forget, no reply is expected or possible.
//! - [`Request`]: expects exactly one [`Response`] of type `Request::Response` when sent
//!   with `query`, or none when sent fire-and-forget.
//! - [`Response`]: only meaningful as the reply to a pending request.
//!
//! Every concrete message type declares a wire discriminator ([`Message::TYPE`]). Locally,
//! bodies travel as type-erased values ([`Body`]) and are never serialized; envelopes leaving
//! the process are encoded as `{"type": ..., "data": ...}` and decoded on the other side through
//! a [`MessageRegistry`] populated at start-up.

use crate::framework::address::ActorAddress;
use crate::framework::error::RuntimeError;
use crate::reliable::AckId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Which of the three message families a body belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Notification,
    Request,
    Response,
}

/// Data that can travel inside an envelope.
///
/// Implementors pick exactly one of [`Notification`], [`Request`] or [`Response`] as well.
pub trait Message: Any + Clone + Debug + Send + Sync + Serialize + DeserializeOwned {
    /// Wire discriminator, unique across every message type known to a process.
    const TYPE: &'static str;

    /// The acknowledgment id of acknowledgeable messages.
    ///
    /// Types implementing [`Acknowledgeable`](crate::reliable::Acknowledgeable) override this
    /// to return `Some`.
    fn ack_id(&self) -> Option<AckId> {
        None
    }
}

pub trait Notification: Message {}

pub trait Request: Message {
    type Response: Response;
}

pub trait Response: Message {}

/// Object-safe view of a message, used behind [`Body`].
trait Payload: Debug + Send + Sync {
    fn type_name(&self) -> &'static str;
    fn payload_type(&self) -> TypeId;
    fn as_any(&self) -> &dyn Any;
    fn ack_id(&self) -> Option<AckId>;
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}

impl<T: Message> Payload for T {
    fn type_name(&self) -> &'static str {
        T::TYPE
    }

    fn payload_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn ack_id(&self) -> Option<AckId> {
        Message::ack_id(self)
    }

    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// A type-erased, immutable message body. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Body {
    kind: MessageKind,
    payload: Arc<dyn Payload>,
}

impl Body {
    pub fn notification<N: Notification>(message: N) -> Self {
        Self {
            kind: MessageKind::Notification,
            payload: Arc::new(message),
        }
    }

    pub fn request<R: Request>(message: R) -> Self {
        Self {
            kind: MessageKind::Request,
            payload: Arc::new(message),
        }
    }

    pub fn response<R: Response>(message: R) -> Self {
        Self {
            kind: MessageKind::Response,
            payload: Arc::new(message),
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// The wire discriminator of the contained message.
    pub fn type_name(&self) -> &'static str {
        self.payload.type_name()
    }

    pub fn payload_type(&self) -> TypeId {
        self.payload.payload_type()
    }

    pub fn is<T: Message>(&self) -> bool {
        self.payload_type() == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref::<T>()
    }

    pub fn ack_id(&self) -> Option<AckId> {
        self.payload.ack_id()
    }

    /// Extracts a response of the expected type, turning `ActorNotFound` into an error.
    pub(crate) fn into_response<T: Response>(self) -> Result<T, RuntimeError> {
        if let Some(not_found) = self.downcast_ref::<ActorNotFound>() {
            return Err(RuntimeError::ActorNotFound(not_found.address));
        }
        self.downcast_ref::<T>()
            .cloned()
            .ok_or(RuntimeError::UnexpectedResponse {
                expected: T::TYPE,
                actual: self.type_name(),
            })
    }

    pub(crate) fn to_wire(&self) -> Result<WireBody, RuntimeError> {
        Ok(WireBody {
            type_name: self.type_name().to_string(),
            data: self.payload.to_json()?,
        })
    }
}

/// Serialized form of a [`Body`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireBody {
    #[serde(rename = "type")]
    pub type_name: String,
    pub data: serde_json::Value,
}

/// Sent back by a process when a request targets an actor it does not host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorNotFound {
    pub address: ActorAddress,
}

impl Message for ActorNotFound {
    const TYPE: &'static str = "mesh.ActorNotFound";
}

impl Response for ActorNotFound {}

type Decoder = fn(serde_json::Value) -> serde_json::Result<Body>;

fn decode_notification<T: Notification>(data: serde_json::Value) -> serde_json::Result<Body> {
    Ok(Body::notification(serde_json::from_value::<T>(data)?))
}

fn decode_request<T: Request>(data: serde_json::Value) -> serde_json::Result<Body> {
    Ok(Body::request(serde_json::from_value::<T>(data)?))
}

fn decode_response<T: Response>(data: serde_json::Value) -> serde_json::Result<Body> {
    Ok(Body::response(serde_json::from_value::<T>(data)?))
}

/// Discriminator-to-decoder table used to turn wire bodies back into typed messages.
///
/// Built once at start-up; every message type that may cross a process boundary must be
/// registered on both sides.
#[derive(Clone)]
pub struct MessageRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRegistry {
    /// A registry that already knows the runtime's own messages.
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: HashMap::new(),
        };
        registry.register_response::<ActorNotFound>();
        registry
    }

    pub fn register_notification<T: Notification>(&mut self) -> &mut Self {
        self.insert(T::TYPE, decode_notification::<T>)
    }

    /// Registers a request type together with its response type.
    pub fn register_request<T: Request>(&mut self) -> &mut Self {
        self.insert(T::TYPE, decode_request::<T>);
        self.register_response::<T::Response>()
    }

    pub fn register_response<T: Response>(&mut self) -> &mut Self {
        self.insert(T::TYPE, decode_response::<T>)
    }

    fn insert(&mut self, type_name: &'static str, decoder: Decoder) -> &mut Self {
        if self.decoders.insert(type_name, decoder).is_some() {
            tracing::debug!(type_name, "Message type registered twice");
        }
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    pub fn decode(&self, wire: WireBody) -> Result<Body, RuntimeError> {
        let decoder = self
            .decoders
            .get(wire.type_name.as_str())
            .ok_or_else(|| RuntimeError::UnknownMessageType(wire.type_name.clone()))?;
        Ok(decoder(wire.data)?)
    }
}
