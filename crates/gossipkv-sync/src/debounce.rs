//! The ingest debouncer and its `Clock` seam.
//!
//! Received messages are bucketed by `(messageType, peerId)`. The first
//! message for a bucket starts a 1-second timer; subsequent messages
//! for the same key before the timer fires are dropped. On expiry the
//! stored message is dispatched and the bucket cleared.
//!
//! Outstanding timers cannot be cancelled, so the one-shot scheduled
//! task is expressed as a closure that checks slot occupancy before
//! dispatching: a handler firing against an already-cleared slot must
//! be a no-op. [`DebounceBucket`] implements exactly that — the
//! scheduled closure removes its own entry and only dispatches if it
//! was still there.
//!
//! The host's implicit `now()`/`newTimer` pair is represented here as
//! an explicit [`Clock`] trait, so the engine can be driven
//! deterministically in tests instead of by real elapsed wall time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::messages::{Envelope, MessageType};

/// Seconds since an arbitrary, monotonic epoch. Never wall-clock time;
/// only differences between two readings are meaningful.
pub type MonotonicSeconds = f64;

/// An opaque handle to a scheduled one-shot timer. There is no
/// explicit cancellation API, so this handle exists for bookkeeping
/// and test assertions, not for cancelling the timer early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// The host loop's timer and clock, consumed by the engine. An explicit
/// trait object seam over the host's `newTimer(delaySeconds, cb)` /
/// `now()` interface rather than a pair of free collaborator functions,
/// so tests can supply a clock that advances on command instead of
/// sleeping.
pub trait Clock {
    /// Monotonic seconds elapsed since this clock's epoch.
    fn now(&self) -> MonotonicSeconds;

    /// Schedule `callback` to run once, after `delay` seconds. The host
    /// is responsible for actually invoking it later on its own loop;
    /// the engine never blocks waiting for it.
    fn schedule_once(&self, delay: MonotonicSeconds, callback: Box<dyn FnOnce()>) -> TimerHandle;
}

/// The 1-second (by default) `(messageType, peerId)` coalescing bucket.
///
/// `pending` is reference-counted so the closure handed to
/// [`Clock::schedule_once`] can hold its own handle to the same map
/// without borrowing `self` for the timer's lifetime.
pub struct DebounceBucket {
    pending: Rc<RefCell<HashMap<(MessageType, String), Envelope>>>,
}

impl Default for DebounceBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl DebounceBucket {
    pub fn new() -> Self {
        DebounceBucket {
            pending: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Offer `envelope` to the debouncer. If no message is currently
    /// pending for `(envelope.message_type, envelope.peer_id)`, this
    /// starts a `window`-second timer and returns `true`; `dispatch`
    /// fires exactly once, when the timer elapses, with the envelope
    /// that was stored (always the *first* one offered for this
    /// bucket). If a message is already pending for this key,
    /// `envelope` is dropped and this returns `false`.
    pub fn offer(
        &self,
        clock: &dyn Clock,
        window: MonotonicSeconds,
        envelope: Envelope,
        dispatch: impl FnOnce(Envelope) + 'static,
    ) -> bool {
        let key = (envelope.message_type, envelope.peer_id.clone());
        {
            let mut pending = self.pending.borrow_mut();
            if pending.contains_key(&key) {
                return false;
            }
            pending.insert(key.clone(), envelope);
        }
        let pending = Rc::clone(&self.pending);
        clock.schedule_once(
            window,
            Box::new(move || {
                if let Some(envelope) = pending.borrow_mut().remove(&key) {
                    dispatch(envelope);
                }
            }),
        );
        true
    }

    /// Number of buckets currently awaiting dispatch. Test/diagnostic use.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::EnvelopeValue;
    use std::cell::Cell;

    /// A clock that never fires on its own; tests fire timers manually
    /// via [`ManualClock::fire_all`] to drive time deterministically.
    #[derive(Default)]
    struct ManualClock {
        now: Cell<MonotonicSeconds>,
        next_handle: Cell<u64>,
        scheduled: RefCell<Vec<Box<dyn FnOnce()>>>,
    }

    impl ManualClock {
        fn fire_all(&self) {
            let callbacks = std::mem::take(&mut *self.scheduled.borrow_mut());
            for cb in callbacks {
                cb();
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> MonotonicSeconds {
            self.now.get()
        }

        fn schedule_once(&self, _delay: MonotonicSeconds, callback: Box<dyn FnOnce()>) -> TimerHandle {
            let handle = TimerHandle(self.next_handle.get());
            self.next_handle.set(handle.0 + 1);
            self.scheduled.borrow_mut().push(callback);
            handle
        }
    }

    fn envelope(peer: &str) -> Envelope {
        Envelope {
            message_type: MessageType::Digest,
            peer_id: peer.to_string(),
            data: EnvelopeValue::Empty,
        }
    }

    #[test]
    fn first_message_for_a_bucket_schedules_a_dispatch() {
        let clock = ManualClock::default();
        let bucket = DebounceBucket::new();
        let dispatched = Rc::new(RefCell::new(None));
        let dispatched_clone = Rc::clone(&dispatched);

        let accepted = bucket.offer(&clock, 1.0, envelope("p1"), move |e| {
            *dispatched_clone.borrow_mut() = Some(e.peer_id);
        });
        assert!(accepted);
        assert_eq!(bucket.pending_count(), 1);

        clock.fire_all();
        assert_eq!(dispatched.borrow().as_deref(), Some("p1"));
        assert_eq!(bucket.pending_count(), 0);
    }

    #[test]
    fn duplicate_messages_before_expiry_are_dropped() {
        let clock = ManualClock::default();
        let bucket = DebounceBucket::new();
        let dispatch_count = Rc::new(Cell::new(0));

        let first_count = Rc::clone(&dispatch_count);
        assert!(bucket.offer(&clock, 1.0, envelope("p1"), move |_| {
            first_count.set(first_count.get() + 1);
        }));

        let second_count = Rc::clone(&dispatch_count);
        assert!(!bucket.offer(&clock, 1.0, envelope("p1"), move |_| {
            second_count.set(second_count.get() + 1);
        }));

        clock.fire_all();
        assert_eq!(dispatch_count.get(), 1);
    }

    #[test]
    fn distinct_peers_get_independent_buckets() {
        let clock = ManualClock::default();
        let bucket = DebounceBucket::new();
        assert!(bucket.offer(&clock, 1.0, envelope("p1"), |_| {}));
        assert!(bucket.offer(&clock, 1.0, envelope("p2"), |_| {}));
        assert_eq!(bucket.pending_count(), 2);
    }

    #[test]
    fn a_fired_timer_against_an_already_cleared_slot_is_a_no_op() {
        let clock = ManualClock::default();
        let bucket = DebounceBucket::new();
        let dispatch_count = Rc::new(Cell::new(0));
        let count = Rc::clone(&dispatch_count);
        bucket.offer(&clock, 1.0, envelope("p1"), move |_| {
            count.set(count.get() + 1);
        });
        clock.fire_all();
        assert_eq!(dispatch_count.get(), 1);
        // A second, stray fire of an already-consumed timer (simulated by
        // calling fire_all again on an empty schedule) must not re-dispatch.
        clock.fire_all();
        assert_eq!(dispatch_count.get(), 1);
    }
}
