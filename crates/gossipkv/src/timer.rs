//! The host timer/loop seam and its default, test-friendly backing.
//!
//! Mirrors the host's `newTimer(delaySeconds, cb)`, `now()`,
//! `onFrameTick(cb)` interface. `HostClock` is a superset of
//! `gossipkv_sync::Clock` — it adds `on_frame_tick`,
//! the one piece of the host loop interface the sync engine itself
//! doesn't need (only [`crate::database::DatabaseInstance`] uses it, to
//! drive `SyncEngine::tick` once per frame).

use std::cell::RefCell;
use std::rc::Rc;

use gossipkv_sync::{Clock, MonotonicSeconds, TimerHandle};

/// The host's per-frame update loop and one-shot timer/clock, consumed
/// by [`crate::database::DatabaseInstance`].
pub trait HostClock: Clock {
    /// Register a callback the host invokes once per render frame.
    /// Multiple registrations all fire, in registration order.
    fn on_frame_tick(&self, callback: Box<dyn FnMut()>);
}

/// A deterministic, manually-driven [`HostClock`] for tests and for any
/// embedding without a real frame loop: `schedule_once` fires
/// immediately rather than waiting, and `advance`/`tick` are driven by
/// the caller instead of a host render loop.
#[derive(Default)]
pub struct ManualHostClock {
    now: RefCell<MonotonicSeconds>,
    frame_callbacks: RefCell<Vec<Box<dyn FnMut()>>>,
}

impl ManualHostClock {
    pub fn new() -> Rc<Self> {
        Rc::new(ManualHostClock::default())
    }

    /// Advance the clock by `delta` seconds without firing anything.
    pub fn advance(&self, delta: MonotonicSeconds) {
        *self.now.borrow_mut() += delta;
    }

    /// Invoke every registered frame callback once, simulating one host
    /// render frame.
    pub fn fire_frame(&self) {
        let mut callbacks = self.frame_callbacks.borrow_mut();
        for callback in callbacks.iter_mut() {
            callback();
        }
    }
}

impl Clock for ManualHostClock {
    fn now(&self) -> MonotonicSeconds {
        *self.now.borrow()
    }

    /// Fires `callback` immediately. A real host would honor `delay`;
    /// this adapter exists for tests and non-interactive embeddings
    /// where nothing is waiting on wall-clock time.
    fn schedule_once(&self, _delay: MonotonicSeconds, callback: Box<dyn FnOnce()>) -> TimerHandle {
        callback();
        TimerHandle(0)
    }
}

impl HostClock for ManualHostClock {
    fn on_frame_tick(&self, callback: Box<dyn FnMut()>) {
        self.frame_callbacks.borrow_mut().push(callback);
    }
}
