//! # Retry Until Acknowledged
//!
//! An [`AckRetryer`] lives inside the sending actor. Each message it sends is kept as pending
//! under its acknowledgment id and re-sent whenever the retry timer fires. The timer is an
//! ordinary delayed [`RetrySend`] notification addressed to the actor itself, so retries run on
//! the dispatch task like everything else.
//!
//! The owning actor must let the retryer look at every envelope before its own routing:
//!
//! ```ignore
//! fn process(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) -> Result<(), ActorError> {
//!     if self.retryer.process(ctx, envelope) {
//!         return Ok(());
//!     }
//!     router().dispatch(self, ctx, envelope)
//! }
//! ```

use crate::framework::{
    ActorAddress, Body, Context, Envelope, Message, Notification, RuntimeError, Timer,
};
use crate::reliable::{AckId, Acknowledgeable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Self-addressed tick asking the retryer to send a pending message again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySend {
    pub ack_id: AckId,
}

impl Message for RetrySend {
    const TYPE: &'static str = "mesh.RetrySend";
}

impl Notification for RetrySend {}

/// Computes the wait before the next attempt from the retry count (starting at 1).
/// `None` stops retrying that message.
pub type DelayFunction = Box<dyn Fn(u32) -> Option<Duration> + Send>;

type Resolver = Box<dyn FnMut(u32) -> Option<ActorAddress> + Send>;

enum Target {
    Fixed(ActorAddress),
    /// Picks the receiver for each attempt; `None` skips that attempt.
    Resolver(Resolver),
}

struct PendingMessage {
    body: Body,
    target: Target,
    retry_count: u32,
    timer: Option<Timer>,
}

impl PendingMessage {
    fn deliver(&mut self, ctx: &Context<'_>) {
        let receiver = match &mut self.target {
            Target::Fixed(receiver) => Some(*receiver),
            Target::Resolver(resolve) => resolve(self.retry_count),
        };
        match receiver {
            Some(receiver) => ctx.send_body(receiver, self.body.clone()),
            None => debug!(
                message = self.body.type_name(),
                retry_count = self.retry_count,
                "No receiver for this attempt"
            ),
        }
    }
}

pub struct AckRetryer {
    pending: HashMap<AckId, PendingMessage>,
    delay: DelayFunction,
    max_retries: u32,
}

impl AckRetryer {
    pub const DEFAULT_MAX_RETRIES: u32 = 20;

    pub fn new<F>(delay: F) -> Self
    where
        F: Fn(u32) -> Option<Duration> + Send + 'static,
    {
        Self {
            pending: HashMap::new(),
            delay: Box::new(delay),
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }

    /// Retries every `delay`.
    pub fn constant_delay(delay: Duration) -> Self {
        Self::new(move |_| Some(delay))
    }

    /// Waits `base + increment * retry_count` before each retry.
    pub fn additive_delay(base: Duration, increment: Duration) -> Self {
        Self::new(move |retry_count| Some(base + increment * retry_count))
    }

    /// Maximum number of retries after the first attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn is_pending(&self, ack_id: &AckId) -> bool {
        self.pending.contains_key(ack_id)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Sends `message` now and keeps re-sending it until acknowledged.
    pub fn send<N>(
        &mut self,
        ctx: &Context<'_>,
        receiver: ActorAddress,
        message: N,
    ) -> Result<(), RuntimeError>
    where
        N: Notification + Acknowledgeable,
    {
        self.start(ctx, Target::Fixed(receiver), message, None)
    }

    /// Like [`AckRetryer::send`], resolving the receiver again on every attempt.
    pub fn send_with<N, F>(
        &mut self,
        ctx: &Context<'_>,
        resolver: F,
        message: N,
    ) -> Result<(), RuntimeError>
    where
        N: Notification + Acknowledgeable,
        F: FnMut(u32) -> Option<ActorAddress> + Send + 'static,
    {
        self.start(ctx, Target::Resolver(Box::new(resolver)), message, None)
    }

    /// Sends `message` for the first time after `initial_delay`, then retries as usual.
    pub fn send_delayed<N>(
        &mut self,
        ctx: &Context<'_>,
        receiver: ActorAddress,
        message: N,
        initial_delay: Duration,
    ) -> Result<(), RuntimeError>
    where
        N: Notification + Acknowledgeable,
    {
        self.start(ctx, Target::Fixed(receiver), message, Some(initial_delay))
    }

    fn start<N>(
        &mut self,
        ctx: &Context<'_>,
        target: Target,
        message: N,
        initial_delay: Option<Duration>,
    ) -> Result<(), RuntimeError>
    where
        N: Notification + Acknowledgeable,
    {
        let ack_id = Message::ack_id(&message).ok_or(RuntimeError::MissingAckId)?;
        if self.pending.contains_key(&ack_id) {
            return Err(RuntimeError::AlreadyPending(ack_id));
        }

        let mut pending = PendingMessage {
            body: Body::notification(message),
            target,
            retry_count: 0,
            timer: None,
        };
        let delay = match initial_delay {
            Some(delay) => Some(delay),
            None => {
                pending.retry_count = 1;
                pending.deliver(ctx);
                (self.delay)(pending.retry_count)
            }
        };
        pending.timer = schedule_retry(ctx, ack_id, delay);
        if pending.timer.is_some() {
            self.pending.insert(ack_id, pending);
        }
        Ok(())
    }

    /// Stops retrying `ack_id`. Returns false if it was not pending.
    pub fn give_up(&mut self, ack_id: &AckId) -> bool {
        match self.pending.remove(ack_id) {
            Some(pending) => {
                if let Some(timer) = pending.timer {
                    timer.cancel();
                }
                true
            }
            None => false,
        }
    }

    /// Handles retry ticks and acknowledgments.
    ///
    /// Returns true when the envelope was a retry tick, which the actor must not process any
    /// further. Acknowledgments clear the pending message and return false, so the actor
    /// still sees them.
    pub fn process(&mut self, ctx: &Context<'_>, envelope: &Envelope) -> bool {
        if let Some(retry) = envelope.message::<RetrySend>() {
            if envelope.sender() == Some(ctx.address()) {
                self.retry(ctx, retry.ack_id);
                return true;
            }
        }

        if let Some(ack_id) = envelope.body().ack_id() {
            if let Some(pending) = self.pending.remove(&ack_id) {
                if let Some(timer) = pending.timer {
                    timer.cancel();
                }
                debug!(%ack_id, retry_count = pending.retry_count, "Acknowledged");
            }
        }
        false
    }

    fn retry(&mut self, ctx: &Context<'_>, ack_id: AckId) {
        let Some(pending) = self.pending.get_mut(&ack_id) else {
            trace!(%ack_id, "Retry tick for a settled message");
            return;
        };

        pending.retry_count += 1;
        pending.deliver(ctx);
        if pending.retry_count > self.max_retries {
            debug!(%ack_id, max_retries = self.max_retries, "Giving up");
            self.pending.remove(&ack_id);
            return;
        }

        let delay = (self.delay)(pending.retry_count);
        pending.timer = schedule_retry(ctx, ack_id, delay);
        if pending.timer.is_none() {
            self.pending.remove(&ack_id);
        }
    }
}

fn schedule_retry(ctx: &Context<'_>, ack_id: AckId, delay: Option<Duration>) -> Option<Timer> {
    let Some(delay) = delay else {
        debug!(%ack_id, "Delay function stopped the retries");
        return None;
    };
    match ctx.send_delayed(ctx.address(), RetrySend { ack_id }, delay) {
        Ok(timer) => Some(timer),
        Err(error) => {
            warn!(%ack_id, %error, "Cannot schedule retry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_functions() {
        let constant = AckRetryer::constant_delay(Duration::from_secs(2));
        assert_eq!((constant.delay)(1), Some(Duration::from_secs(2)));
        assert_eq!((constant.delay)(9), Some(Duration::from_secs(2)));
        assert_eq!(constant.max_retries(), AckRetryer::DEFAULT_MAX_RETRIES);

        let additive =
            AckRetryer::additive_delay(Duration::from_millis(100), Duration::from_millis(50))
                .with_max_retries(3);
        assert_eq!((additive.delay)(1), Some(Duration::from_millis(150)));
        assert_eq!((additive.delay)(4), Some(Duration::from_millis(300)));
        assert_eq!(additive.max_retries(), 3);
    }

    #[test]
    fn give_up_on_unknown_id_is_a_no_op() {
        let mut retryer = AckRetryer::constant_delay(Duration::from_secs(1));
        assert!(!retryer.give_up(&AckId::new_v4()));
        assert_eq!(retryer.pending(), 0);
    }
}
