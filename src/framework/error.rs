//! # Runtime Errors
//!
//! This module defines the common error types used throughout the runtime.
//! Failures that callers can act on (`query` results, spawn misconfiguration) are typed
//! [`RuntimeError`] values; failures raised by actor code are [`ActorError`]s and are
//! handed to the actor's supervisor instead of being propagated.

use crate::framework::actor::ActorState;
use crate::framework::address::ActorAddress;
use crate::reliable::AckId;

/// Whatever an actor's `process` returns when it fails.
pub type ActorError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of [`RuntimeError`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ActorNotFound,
    Timeout,
    MalformedEnvelope,
    Lifecycle,
    Protocol,
}

/// Errors surfaced by the runtime itself.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("actor {0} not found")]
    ActorNotFound(ActorAddress),
    #[error("request {request_id} timed out")]
    Timeout { request_id: u64 },
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("actor {address} is {state:?}, expected it to be alive")]
    ActorNotAlive {
        address: ActorAddress,
        state: ActorState,
    },
    #[error("expected a {expected} response, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("world stopped")]
    WorldStopped,
    #[error("actor number {0} is already taken")]
    DuplicateActorNumber(u64),
    #[error("actor number {0} is outside the well-known range")]
    InvalidActorNumber(u64),
    #[error("unknown message type {0:?}")]
    UnknownMessageType(String),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("message does not carry an acknowledgment id")]
    MissingAckId,
    #[error("message {0} is already pending")]
    AlreadyPending(AckId),
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::ActorNotFound(_) => ErrorKind::ActorNotFound,
            RuntimeError::Timeout { .. } => ErrorKind::Timeout,
            RuntimeError::MalformedEnvelope(_)
            | RuntimeError::UnknownMessageType(_)
            | RuntimeError::Codec(_) => ErrorKind::MalformedEnvelope,
            RuntimeError::ActorNotAlive { .. }
            | RuntimeError::WorldStopped
            | RuntimeError::DuplicateActorNumber(_)
            | RuntimeError::InvalidActorNumber(_) => ErrorKind::Lifecycle,
            RuntimeError::UnexpectedResponse { .. }
            | RuntimeError::MissingAckId
            | RuntimeError::AlreadyPending(_) => ErrorKind::Protocol,
        }
    }
}
