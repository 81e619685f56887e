//! A single table: its schema, its rows, and its own change callback.

use std::collections::HashMap;
use std::rc::Rc;

use gossipkv_core::{Key, KeyType, Row, RowData, Schema};

use crate::subscriber::{ChangeCallback, SubscriberRegistry, SubscriptionHandle};

/// A table's optional validator predicate: given the schema-projected
/// data a write is about to apply, return `false` to reject the write.
/// Runs inside `set` (and therefore `insert`/`update`, which delegate to
/// it); a validator that rejects a write causes `set` to return `false`
/// without mutating anything and without bumping the clock.
pub type Validator = Box<dyn Fn(&Key, &RowData) -> bool>;

/// Static facts about a table, fixed at [`crate::VersionedStore::new_table`]
/// time and never changed afterward.
pub struct TableDescriptor {
    pub name: String,
    pub key_type: KeyType,
    pub schema: Option<Schema>,
}

/// A table's rows plus its own subscriber registry and optional
/// table-level change callback.
///
/// Callback fanout runs database-level, then table-level, then
/// per-row subscribers; the table-level callback lives here as a plain
/// `Option` (set at most once, at table creation) rather than through
/// the RAII handle subscribers use, since it's a single fixed hook
/// rather than a dynamic registration.
pub struct Table {
    pub descriptor: TableDescriptor,
    pub rows: HashMap<Key, Row>,
    pub on_change: Option<ChangeCallback>,
    pub validator: Option<Validator>,
    pub subscribers: Rc<SubscriberRegistry>,
}

impl Table {
    pub fn new(
        descriptor: TableDescriptor,
        on_change: Option<ChangeCallback>,
        validator: Option<Validator>,
    ) -> Self {
        Table {
            descriptor,
            rows: HashMap::new(),
            on_change,
            validator,
            subscribers: SubscriberRegistry::new(),
        }
    }

    /// Run the table's validator (if any) against a candidate write.
    /// No validator means every write is accepted.
    pub fn validate(&self, key: &Key, data: &RowData) -> bool {
        self.validator.as_ref().map(|v| v(key, data)).unwrap_or(true)
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn key_type(&self) -> KeyType {
        self.descriptor.key_type
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.descriptor.schema.as_ref()
    }

    /// Live (non-tombstone) row for `key`, if present.
    pub fn get_live(&self, key: &Key) -> Option<&Row> {
        self.rows.get(key).filter(|row| !row.is_tombstone())
    }

    pub fn subscribe(&self, callback: ChangeCallback) -> SubscriptionHandle {
        self.subscribers.subscribe(callback)
    }

    /// Fire the table-level callback (if any) followed by subscriber
    /// fanout, in that order, for a single row change.
    pub fn notify(&self, key: &Key, data: Option<&gossipkv_core::RowData>) {
        if let Some(cb) = &self.on_change {
            cb(key, data);
        }
        self.subscribers.fanout(key, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> TableDescriptor {
        TableDescriptor {
            name: name.to_string(),
            key_type: KeyType::String,
            schema: None,
        }
    }

    #[test]
    fn get_live_hides_tombstones() {
        let mut table = Table::new(descriptor("t"), None, None);
        let key = Key::Str("k".into());
        let version = gossipkv_core::Version::new_local(1, "p1", &key, true).unwrap();
        table.rows.insert(key.clone(), Row::tombstone(version));
        assert!(table.get_live(&key).is_none());
    }

    #[test]
    fn notify_runs_table_callback_then_subscribers() {
        use std::cell::RefCell;
        use std::rc::Rc as StdRc;

        let order: StdRc<RefCell<Vec<&'static str>>> = StdRc::new(RefCell::new(Vec::new()));
        let order_table = StdRc::clone(&order);
        let table = Table::new(
            descriptor("t"),
            Some(Box::new(move |_, _| order_table.borrow_mut().push("table"))),
            None,
        );
        let order_sub = StdRc::clone(&order);
        let _handle = table.subscribe(Box::new(move |_, _| order_sub.borrow_mut().push("sub")));

        table.notify(&Key::Str("k".into()), None);
        assert_eq!(order.borrow().as_slice(), ["table", "sub"]);
    }

    #[test]
    fn missing_validator_accepts_everything() {
        let table = Table::new(descriptor("t"), None, None);
        assert!(table.validate(&Key::Str("k".into()), &RowData::new()));
    }

    #[test]
    fn validator_can_reject_a_write() {
        let table = Table::new(
            descriptor("t"),
            None,
            Some(Box::new(|_, data| data.contains_key("age"))),
        );
        assert!(!table.validate(&Key::Str("k".into()), &RowData::new()));
    }
}
