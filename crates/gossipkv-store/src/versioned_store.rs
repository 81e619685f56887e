//! The versioned, schema-validated, callback-fanout table store.
//!
//! [`VersionedStore`] owns the local Lamport clock: every local write
//! (`insert`/`set`/`update`/`delete`) bumps `clock` before stamping the
//! row's [`Version`], and
//! every row written this way is authored by `local_peer`. Remote rows
//! arriving through anti-entropy never bump the local clock; they go
//! through [`VersionedStore::merge_row`] instead, which only applies an
//! incoming row when it dominates under the LWW predicate.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use gossipkv_core::{schema_copy, Key, KeyType, Row, RowData, Schema, Version};

use crate::error::{Result, StoreError};
use crate::subscriber::{ChangeCallback, SubscriptionHandle};
use crate::table::{Table, TableDescriptor, Validator};

/// Database-level change callback: fires for every row change in every
/// table, before the table's own callback and its subscribers.
pub type DbChangeCallback = Box<dyn Fn(&str, &Key, Option<&RowData>)>;

/// Controls fanout suppression during a merge pass.
///
/// Rather than a mutable flag threaded implicitly through the whole
/// store, it's an explicit argument to [`VersionedStore::merge_row`],
/// so a sync engine applying a batch of remote rows can opt into a
/// single fanout at the end of the batch instead of one callback
/// invocation per row.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeContext {
    pub suppress_fanout: bool,
}

/// A non-fatal problem with a single incoming row during merge. Unlike
/// [`StoreError`], a warning does not abort the merge: the row is
/// simply skipped and the caller is told why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowWarning {
    /// The incoming row's data failed schema validation; the row was
    /// not applied.
    SchemaRejected { key: Key, reason: String },
}

/// The schema-validated, version-merged, callback-driven table store
/// for a single local database instance.
pub struct VersionedStore {
    local_peer: String,
    clock: Cell<u64>,
    tables: RefCell<HashMap<String, Table>>,
    db_change: RefCell<Option<DbChangeCallback>>,
}

impl VersionedStore {
    pub fn new(local_peer: impl Into<String>) -> Self {
        VersionedStore {
            local_peer: local_peer.into(),
            clock: Cell::new(0),
            tables: RefCell::new(HashMap::new()),
            db_change: RefCell::new(None),
        }
    }

    pub fn local_peer(&self) -> &str {
        &self.local_peer
    }

    /// The current Lamport clock value, without advancing it.
    pub fn clock(&self) -> u64 {
        self.clock.get()
    }

    /// Set the database-level callback. Replaces any previous one;
    /// intended to be called exactly once by the owning database
    /// instance at construction time.
    pub fn set_db_change_callback(&self, callback: DbChangeCallback) {
        *self.db_change.borrow_mut() = Some(callback);
    }

    fn bump_clock(&self) -> u64 {
        let next = self.clock.get() + 1;
        self.clock.set(next);
        next
    }

    pub fn new_table(
        &self,
        name: impl Into<String>,
        key_type: KeyType,
        schema: Option<Schema>,
        on_change: Option<ChangeCallback>,
        validator: Option<Validator>,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(StoreError::EmptyTableName);
        }
        let mut tables = self.tables.borrow_mut();
        if tables.contains_key(&name) {
            return Err(StoreError::DuplicateTable(name));
        }
        let descriptor = TableDescriptor {
            name: name.clone(),
            key_type,
            schema,
        };
        tables.insert(name, Table::new(descriptor, on_change, validator));
        Ok(())
    }

    fn check_key_type(table: &Table, key: &Key) -> Result<()> {
        if key.key_type() != table.key_type() {
            return Err(StoreError::KeyTypeMismatch {
                table: table.name().to_string(),
                expected: table.key_type(),
                actual: key.key_type(),
            });
        }
        Ok(())
    }

    fn notify(&self, table_name: &str, table: &Table, key: &Key, data: Option<&RowData>) {
        if let Some(cb) = self.db_change.borrow().as_ref() {
            cb(table_name, key, data);
        }
        table.notify(key, data);
    }

    /// Write a live local row, stamping it with a freshly bumped clock
    /// value. `require_absent` enforces `insert`'s no-clobber rule;
    /// `require_present` enforces `update`'s must-exist rule. At most
    /// one of the two is ever true at a call site.
    fn write_local(
        &self,
        table_name: &str,
        key: Key,
        data: RowData,
        require_absent: bool,
        require_present: bool,
    ) -> Result<bool> {
        let mut tables = self.tables.borrow_mut();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        Self::check_key_type(table, &key)?;

        let live_exists = table.get_live(&key).is_some();
        if require_absent && live_exists {
            return Err(StoreError::InsertOverLiveKey {
                table: table_name.to_string(),
            });
        }
        if require_present && !live_exists {
            return Err(StoreError::NoLiveRow {
                table: table_name.to_string(),
            });
        }

        let projected = schema_copy(table.schema(), &data)?;
        if !table.validate(&key, &projected) {
            return Ok(false);
        }
        if table
            .get_live(&key)
            .map(|row| row.data() == Some(&projected))
            .unwrap_or(false)
        {
            // Shallow-equal to the current live row: skip the write and
            // the fanout entirely.
            return Ok(true);
        }

        let clock = self.bump_clock();
        let version = Version::new_local(clock, &self.local_peer, &key, false)?;
        table.rows.insert(key.clone(), Row::live(projected.clone(), version));
        self.notify(table_name, table, &key, Some(&projected));
        Ok(true)
    }

    /// Insert a new row. Fails if `key` already has a live (non-
    /// tombstone) row.
    pub fn insert(&self, table: &str, key: Key, data: RowData) -> Result<bool> {
        self.write_local(table, key, data, true, false)
    }

    /// Write `data` to `key`, running the table's validator and the
    /// shallow-equality skip-write check. Returns `false` (without
    /// mutating anything or bumping the clock) iff the validator
    /// rejected the write.
    pub fn set(&self, table: &str, key: Key, data: RowData) -> Result<bool> {
        self.write_local(table, key, data, false, false)
    }

    /// Fails if no live row exists for `key`; otherwise feeds a shallow
    /// copy of the current data to `f` and delegates the result to
    /// `set`.
    pub fn update(&self, table_name: &str, key: Key, f: impl FnOnce(RowData) -> RowData) -> Result<bool> {
        let current = {
            let tables = self.tables.borrow();
            let table = tables
                .get(table_name)
                .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
            Self::check_key_type(table, &key)?;
            table
                .get_live(&key)
                .ok_or_else(|| StoreError::NoLiveRow {
                    table: table_name.to_string(),
                })?
                .data()
                .cloned()
                .unwrap_or_default()
        };
        let next = f(current);
        self.write_local(table_name, key, next, false, true)
    }

    pub fn get(&self, table: &str, key: &Key) -> Result<Option<RowData>> {
        let tables = self.tables.borrow();
        let table = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Self::check_key_type(table, key)?;
        Ok(table.get_live(key).and_then(|row| row.data().cloned()))
    }

    pub fn has_key(&self, table: &str, key: &Key) -> Result<bool> {
        Ok(self.get(table, key)?.is_some())
    }

    pub fn delete(&self, table_name: &str, key: Key) -> Result<()> {
        let mut tables = self.tables.borrow_mut();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        Self::check_key_type(table, &key)?;

        if table.rows.get(&key).is_some_and(|row| row.is_tombstone()) {
            // Already a tombstone: nothing to write or announce. A
            // never-written key still gets a fresh tombstone below.
            return Ok(());
        }

        let clock = self.bump_clock();
        let version = Version::new_local(clock, &self.local_peer, &key, true)?;
        table.rows.insert(key.clone(), Row::tombstone(version));
        self.notify(table_name, table, &key, None);
        Ok(())
    }

    pub fn subscribe(&self, table_name: &str, callback: ChangeCallback) -> Result<SubscriptionHandle> {
        let tables = self.tables.borrow();
        let table = tables
            .get(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        Ok(table.subscribe(callback))
    }

    /// Merge an incoming remote row into `table`. Applies it only if it
    /// dominates the current row under the LWW predicate; never bumps
    /// the local clock. Returns `Ok(Some(warning))` when the row's data
    /// fails schema validation (the row is skipped, not fatal to the
    /// merge batch); returns `Ok(None)` when the row was applied or
    /// correctly ignored as stale.
    pub fn merge_row(
        &self,
        table_name: &str,
        key: Key,
        incoming: Row,
        ctx: &MergeContext,
    ) -> Result<Option<RowWarning>> {
        let mut tables = self.tables.borrow_mut();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        Self::check_key_type(table, &key)?;

        let current_version = table.rows.get(&key).map(|row| &row.version);
        if !incoming.version.dominates(current_version, &key) {
            return Ok(None);
        }

        let row = if incoming.is_tombstone() {
            incoming
        } else {
            let data = incoming.data().cloned().unwrap_or_default();
            match schema_copy(table.schema(), &data) {
                Ok(projected) => Row::live(projected, incoming.version),
                Err(err) => {
                    tracing::warn!(table = table_name, ?key, %err, "row rejected by schema during merge");
                    return Ok(Some(RowWarning::SchemaRejected {
                        key,
                        reason: err.to_string(),
                    }))
                }
            }
        };

        let incoming_clock = row.version.clock;
        let data_for_notify = row.data().cloned();
        table.rows.insert(key.clone(), row);
        self.observe_remote_clock(incoming_clock);
        if !ctx.suppress_fanout {
            self.notify(table_name, table, &key, data_for_notify.as_ref());
        }
        Ok(None)
    }

    /// Advance the local Lamport clock to at least `incoming_clock`
    /// (`clock <- max(clock, incoming_clock)` on merge). Only called
    /// when a remote row is actually stored.
    fn observe_remote_clock(&self, incoming_clock: u64) {
        if incoming_clock > self.clock.get() {
            self.clock.set(incoming_clock);
        }
    }

    /// The names of every declared table, for digest/export iteration.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.borrow().keys().cloned().collect()
    }

    /// A table's key type and schema, for codec/sync callers that need
    /// to validate or project incoming data before calling
    /// [`VersionedStore::merge_row`].
    pub fn table_info(&self, table_name: &str) -> Result<(KeyType, Option<Schema>)> {
        let tables = self.tables.borrow();
        let table = tables
            .get(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        Ok((table.key_type(), table.schema().cloned()))
    }

    /// A snapshot of every row in `table`, tombstones included, for
    /// digest computation, export, and serialization.
    pub fn snapshot(&self, table_name: &str) -> Result<Vec<(Key, Row)>> {
        let tables = self.tables.borrow();
        let table = tables
            .get(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        Ok(table.rows.iter().map(|(k, r)| (k.clone(), r.clone())).collect())
    }

    /// The raw row (including tombstones) for `key` in `table`, if any.
    pub fn raw_row(&self, table_name: &str, key: &Key) -> Result<Option<Row>> {
        let tables = self.tables.borrow();
        let table = tables
            .get(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        Ok(table.rows.get(key).cloned())
    }
}
