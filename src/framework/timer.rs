//! # Timers
//!
//! A [`Timer`] is the handle to a message scheduled for later delivery. Each actor owns a
//! [`TimerSet`] holding its outstanding timers; a timer removes itself from that set when it
//! fires or is cancelled, and despawning the actor cancels everything left in the set.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::AbortHandle;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

type Unregister = Box<dyn Fn(u64) + Send + Sync>;

struct TimerInner {
    id: u64,
    state: AtomicU8,
    // Filled after the task is spawned; the state machine makes the gap harmless.
    task: Mutex<Option<AbortHandle>>,
    unregister: Unregister,
}

/// Cancelable handle to a delayed delivery.
#[derive(Clone)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

impl Timer {
    pub(crate) fn new(id: u64, unregister: Unregister) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                id,
                state: AtomicU8::new(PENDING),
                task: Mutex::new(None),
                unregister,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_pending(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == PENDING
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == CANCELLED
    }

    pub(crate) fn attach(&self, task: AbortHandle) {
        if self.is_cancelled() {
            task.abort();
            return;
        }
        *self.inner.task.lock() = Some(task);
    }

    /// Claims the right to deliver. Returns false when the timer was cancelled first.
    pub(crate) fn try_fire(&self) -> bool {
        let fired = self
            .inner
            .state
            .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if fired {
            (self.inner.unregister)(self.inner.id);
        }
        fired
    }

    /// Cancels this timer, preventing it from delivering its message.
    ///
    /// Returns false (and does nothing) if the message was already delivered or the timer was
    /// already cancelled.
    pub fn cancel(&self) -> bool {
        if !self.cancel_without_unregistering() {
            return false;
        }
        (self.inner.unregister)(self.inner.id);
        true
    }

    fn cancel_without_unregistering(&self) -> bool {
        let cancelled = self
            .inner
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            if let Some(task) = self.inner.task.lock().take() {
                task.abort();
            }
        }
        cancelled
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.load(Ordering::Relaxed))
            .finish()
    }
}

/// The outstanding timers of one actor.
#[derive(Clone, Default)]
pub(crate) struct TimerSet {
    timers: Arc<Mutex<HashMap<u64, Timer>>>,
}

impl TimerSet {
    /// Creates a timer registered in this set.
    pub(crate) fn create(&self, id: u64) -> Timer {
        let set: Weak<Mutex<HashMap<u64, Timer>>> = Arc::downgrade(&self.timers);
        let timer = Timer::new(
            id,
            Box::new(move |id| {
                if let Some(set) = set.upgrade() {
                    set.lock().remove(&id);
                }
            }),
        );
        self.timers.lock().insert(id, timer.clone());
        timer
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.timers.lock().len()
    }

    /// Cancels every outstanding timer and forgets them.
    pub(crate) fn cancel_all(&self) -> usize {
        let timers: Vec<Timer> = self.timers.lock().drain().map(|(_, timer)| timer).collect();
        timers
            .iter()
            .filter(|timer| timer.cancel_without_unregistering())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_unregisters_once() {
        let set = TimerSet::default();
        let timer = set.create(1);
        assert_eq!(set.len(), 1);
        assert!(timer.cancel());
        assert!(timer.is_cancelled());
        assert_eq!(set.len(), 0);
        assert!(!timer.cancel());
    }

    #[test]
    fn firing_unregisters_and_blocks_cancel() {
        let set = TimerSet::default();
        let timer = set.create(7);
        assert!(timer.try_fire());
        assert_eq!(set.len(), 0);
        assert!(!timer.cancel());
        assert!(!timer.try_fire());
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let set = TimerSet::default();
        let timer = set.create(3);
        timer.cancel();
        assert!(!timer.try_fire());
    }

    #[test]
    fn cancel_all_empties_the_set() {
        let set = TimerSet::default();
        let first = set.create(1);
        let second = set.create(2);
        assert!(second.try_fire());
        let third = set.create(3);
        assert_eq!(set.cancel_all(), 2);
        assert_eq!(set.len(), 0);
        assert!(first.is_cancelled());
        assert!(third.is_cancelled());
        assert!(!second.is_cancelled());
    }
}
