//! Subscriber handles: RAII registration for table change callbacks.
//!
//! Forgotten subscribers should be reclaimed without an explicit
//! unsubscribe call. The direct Rust idiom for "cleanup happens even if
//! the caller forgets" is RAII: [`subscribe`] returns a
//! [`SubscriptionHandle`] whose `Drop` impl removes the callback, so a
//! subscriber that goes out of scope unregisters itself deterministically.
//!
//! The callback collection also permits removal during iteration — a
//! callback is allowed to drop its own (or another) handle from within
//! itself. Slots are therefore kept behind `Rc` so
//! [`SubscriberRegistry::fanout`] can snapshot the slot list before
//! invoking anything, rather than holding a borrow of the registry
//! across a callback invocation.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use gossipkv_core::{Key, RowData};

/// A table-level or database-level change callback.
pub type ChangeCallback = Box<dyn Fn(&Key, Option<&RowData>)>;

struct Slot {
    id: u64,
    callback: ChangeCallback,
}

/// The registry of subscribers for a single table.
#[derive(Default)]
pub struct SubscriberRegistry {
    slots: RefCell<Vec<Rc<Slot>>>,
    next_id: Cell<u64>,
}

impl SubscriberRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(SubscriberRegistry::default())
    }

    /// Register `callback`, returning a handle that unregisters it on
    /// drop.
    pub fn subscribe(self: &Rc<Self>, callback: ChangeCallback) -> SubscriptionHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.slots.borrow_mut().push(Rc::new(Slot { id, callback }));
        SubscriptionHandle {
            registry: Rc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.slots.borrow_mut().retain(|slot| slot.id != id);
    }

    /// Invoke every slot registered at the moment `fanout` was called.
    /// A callback that unsubscribes itself or another subscriber mid-
    /// fanout is safe: the slot list was already snapshotted via `Rc`
    /// clones, so mutating the registry doesn't affect this pass.
    pub fn fanout(&self, key: &Key, data: Option<&RowData>) {
        let snapshot: Vec<Rc<Slot>> = self.slots.borrow().clone();
        for slot in snapshot {
            (slot.callback)(key, data);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}

/// A live subscription. Dropping it unregisters the callback.
pub struct SubscriptionHandle {
    registry: Weak<SubscriberRegistry>,
    id: u64,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    #[test]
    fn fanout_invokes_registered_callback() {
        let registry = SubscriberRegistry::new();
        let seen: StdRc<StdRefCell<Vec<String>>> = StdRc::new(StdRefCell::new(Vec::new()));
        let seen_clone = StdRc::clone(&seen);

        let _handle = registry.subscribe(Box::new(move |key, _data| {
            seen_clone.borrow_mut().push(key.to_string_repr());
        }));

        registry.fanout(&gossipkv_core::Key::Integer(1), None);
        assert_eq!(seen.borrow().as_slice(), ["1"]);
    }

    #[test]
    fn dropping_handle_unregisters() {
        let registry = SubscriberRegistry::new();
        let handle = registry.subscribe(Box::new(|_, _| {}));
        assert_eq!(registry.len(), 1);
        drop(handle);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn multiple_subscribers_all_fire() {
        let registry = SubscriberRegistry::new();
        let count = StdRc::new(Cell::new(0u32));
        let c1 = StdRc::clone(&count);
        let c2 = StdRc::clone(&count);
        let _h1 = registry.subscribe(Box::new(move |_, _| c1.set(c1.get() + 1)));
        let _h2 = registry.subscribe(Box::new(move |_, _| c2.set(c2.get() + 1)));

        registry.fanout(&gossipkv_core::Key::Integer(1), None);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn unsubscribe_during_fanout_does_not_affect_current_pass() {
        let registry = SubscriberRegistry::new();
        let count = StdRc::new(Cell::new(0u32));
        let c1 = StdRc::clone(&count);
        // This callback drops its own handle while the registry is
        // mid-fanout over the Rc snapshot.
        let handle_cell: StdRc<StdRefCell<Option<SubscriptionHandle>>> =
            StdRc::new(StdRefCell::new(None));
        let handle_cell_clone = StdRc::clone(&handle_cell);
        let handle = registry.subscribe(Box::new(move |_, _| {
            c1.set(c1.get() + 1);
            handle_cell_clone.borrow_mut().take();
        }));
        *handle_cell.borrow_mut() = Some(handle);

        registry.fanout(&gossipkv_core::Key::Integer(1), None);
        assert_eq!(count.get(), 1);
        assert_eq!(registry.len(), 0);
    }
}
