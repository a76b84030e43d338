//! # Acknowledgment Store
//!
//! Receiver-side memory of the outcomes already sent, keyed by acknowledgment id. A retried
//! notification is answered from the store instead of being handled again. The store keeps
//! the latest entries only; the oldest are evicted first.

use crate::framework::{ActorAddress, Context, Envelope, Notification, RuntimeError};
use crate::reliable::{AckId, Acknowledgeable};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

pub struct AckStore<T> {
    entries: HashMap<AckId, T>,
    order: VecDeque<AckId>,
    capacity: usize,
}

impl<T: Notification + Acknowledgeable> Default for AckStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Notification + Acknowledgeable> AckStore<T> {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records `outcome` under its acknowledgment id.
    ///
    /// Recording an id again replaces the outcome without refreshing its age.
    pub fn add(&mut self, outcome: T) -> Result<(), RuntimeError> {
        let ack_id = outcome.ack_id().ok_or(RuntimeError::MissingAckId)?;
        if self.entries.insert(ack_id, outcome).is_none() {
            self.order.push_back(ack_id);
            while self.entries.len() > self.capacity {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.entries.remove(&oldest);
            }
        }
        Ok(())
    }

    pub fn get(&self, ack_id: &AckId) -> Option<&T> {
        self.entries.get(ack_id)
    }

    pub fn contains(&self, ack_id: &AckId) -> bool {
        self.entries.contains_key(ack_id)
    }

    /// Records `outcome` and sends it to `receiver`.
    pub fn send(
        &mut self,
        ctx: &Context<'_>,
        receiver: ActorAddress,
        outcome: T,
    ) -> Result<(), RuntimeError> {
        self.add(outcome.clone())?;
        ctx.send(receiver, outcome);
        Ok(())
    }

    /// Answers a duplicate with the recorded outcome.
    ///
    /// Returns true when `envelope` carries an acknowledgment id that was already handled;
    /// the actor must then skip it.
    pub fn send_if_acknowledged(&self, ctx: &Context<'_>, envelope: &Envelope) -> bool {
        let Some(ack_id) = envelope.body().ack_id() else {
            return false;
        };
        let Some(outcome) = self.entries.get(&ack_id) else {
            return false;
        };
        match envelope.sender() {
            Some(sender) => {
                debug!(%ack_id, %sender, "Duplicate answered from the store");
                ctx.send(sender, outcome.clone());
            }
            None => warn!(%ack_id, "Duplicate without sender, nothing to answer"),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Message;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Done {
        ack_id: AckId,
        value: i64,
    }

    impl Message for Done {
        const TYPE: &'static str = "test.Done";
        fn ack_id(&self) -> Option<AckId> {
            Some(self.ack_id)
        }
    }
    impl Notification for Done {}
    impl Acknowledgeable for Done {}

    fn done(value: i64) -> Done {
        Done {
            ack_id: AckId::new_v4(),
            value,
        }
    }

    #[test]
    fn keeps_the_latest_entries() {
        let mut store = AckStore::with_capacity(2);
        let first = done(1);
        let second = done(2);
        let third = done(3);
        store.add(first.clone()).unwrap();
        store.add(second.clone()).unwrap();
        store.add(third.clone()).unwrap();

        assert_eq!(store.len(), 2);
        assert!(!store.contains(&first.ack_id));
        assert_eq!(store.get(&second.ack_id), Some(&second));
        assert_eq!(store.get(&third.ack_id), Some(&third));
    }

    #[test]
    fn re_adding_replaces_in_place() {
        let mut store = AckStore::with_capacity(2);
        let first = done(1);
        let second = done(2);
        store.add(first.clone()).unwrap();
        store.add(second.clone()).unwrap();
        store
            .add(Done {
                value: 10,
                ..first.clone()
            })
            .unwrap();
        assert_eq!(store.get(&first.ack_id).map(|d| d.value), Some(10));

        // `first` is still the oldest entry.
        store.add(done(3)).unwrap();
        assert!(!store.contains(&first.ack_id));
        assert!(store.contains(&second.ack_id));
    }

    #[test]
    fn default_capacity() {
        let store: AckStore<Done> = AckStore::new();
        assert_eq!(store.capacity, AckStore::<Done>::DEFAULT_CAPACITY);
        assert!(store.is_empty());
    }
}
