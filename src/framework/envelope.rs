//! # Envelopes
//!
//! An [`Envelope`] is the unit placed on a mailbox or sent over the wire: who sent it, who
//! should receive it, the request id correlating it with a request/response conversation
//! (`0` when there is none), the body and the time it was sent. Envelopes are immutable.

use crate::framework::address::ActorAddress;
use crate::framework::error::RuntimeError;
use crate::framework::message::{Body, Message, MessageRegistry, WireBody};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct Envelope {
    sender: Option<ActorAddress>,
    receiver: ActorAddress,
    request_id: u64,
    body: Body,
    sent_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(
        sender: Option<ActorAddress>,
        receiver: ActorAddress,
        request_id: u64,
        body: Body,
    ) -> Self {
        Self {
            sender,
            receiver,
            request_id,
            body,
            sent_at: Utc::now(),
        }
    }

    pub fn sender(&self) -> Option<ActorAddress> {
        self.sender
    }

    pub fn receiver(&self) -> ActorAddress {
        self.receiver
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    /// Shortcut for `self.body().downcast_ref::<T>()`.
    pub fn message<T: Message>(&self) -> Option<&T> {
        self.body.downcast_ref::<T>()
    }

    /// True when the sender waits for a response to this envelope.
    pub fn expects_reply(&self) -> bool {
        self.request_id != 0
    }

    pub fn to_wire(&self) -> Result<WireEnvelope, RuntimeError> {
        Ok(WireEnvelope {
            sender: self.sender,
            receiver: self.receiver,
            request_id: self.request_id,
            body: self.body.to_wire()?,
            sent_at: self.sent_at,
        })
    }
}

/// JSON representation of an envelope, as posted to `/mailbox`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEnvelope {
    #[serde(default)]
    pub sender: Option<ActorAddress>,
    pub receiver: ActorAddress,
    #[serde(default)]
    pub request_id: u64,
    pub body: WireBody,
    pub sent_at: DateTime<Utc>,
}

impl WireEnvelope {
    /// Rebuilds the typed envelope, keeping the original send timestamp.
    pub fn decode(self, registry: &MessageRegistry) -> Result<Envelope, RuntimeError> {
        Ok(Envelope {
            sender: self.sender,
            receiver: self.receiver,
            request_id: self.request_id,
            body: registry.decode(self.body)?,
            sent_at: self.sent_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::message::{MessageKind, Notification};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Hello {
        name: String,
    }

    impl Message for Hello {
        const TYPE: &'static str = "test.Hello";
    }
    impl Notification for Hello {}

    #[test]
    fn wire_form_survives_json() {
        let mut registry = MessageRegistry::new();
        registry.register_notification::<Hello>();

        let envelope = Envelope::new(
            Some(ActorAddress::new(1, 2)),
            ActorAddress::new(3, 4),
            0,
            Body::notification(Hello { name: "ada".into() }),
        );
        let json = serde_json::to_string(&envelope.to_wire().unwrap()).unwrap();
        assert!(json.contains("\"requestId\":0"));
        assert!(json.contains("\"type\":\"test.Hello\""));

        let wire: WireEnvelope = serde_json::from_str(&json).unwrap();
        let decoded = wire.decode(&registry).unwrap();
        assert_eq!(decoded.sender(), envelope.sender());
        assert_eq!(decoded.receiver(), envelope.receiver());
        assert_eq!(decoded.sent_at(), envelope.sent_at());
        assert_eq!(decoded.body().kind(), MessageKind::Notification);
        assert_eq!(decoded.message::<Hello>().map(|h| h.name.as_str()), Some("ada"));
        assert!(!decoded.expects_reply());
    }

    #[test]
    fn sender_and_request_id_are_optional_on_the_wire() {
        let mut registry = MessageRegistry::new();
        registry.register_notification::<Hello>();
        let json = r#"{
            "receiver": "0000000000000003:0000000000000004",
            "body": {"type": "test.Hello", "data": {"name": "bob"}},
            "sentAt": "2024-01-01T00:00:00Z"
        }"#;
        let envelope = serde_json::from_str::<WireEnvelope>(json)
            .unwrap()
            .decode(&registry)
            .unwrap();
        assert_eq!(envelope.sender(), None);
        assert_eq!(envelope.request_id(), 0);
    }
}
