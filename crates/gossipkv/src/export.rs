//! Persisted state layout: the serde-derived shape of a full database
//! export, for hosts that want to snapshot a [`crate::database::DatabaseInstance`]
//! through their own encoder rather than the textual wire codec.
//!
//! The exported value is a map `{clock, tables: {tableName: {rows:
//! {key: {data, version}}}}}`. Empty tables are omitted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gossipkv_core::{Key, RowData, Version};

/// One row's exported shape: its live data (absent for a tombstone) and
/// its version stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowExport {
    pub data: Option<RowData>,
    pub version: Version,
}

/// One table's exported rows, keyed by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableExport {
    pub rows: BTreeMap<Key, RowExport>,
}

/// A full database export: the database-level clock plus every
/// non-empty table's rows. A table with zero rows is omitted entirely
/// rather than represented as an empty `TableExport`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    pub clock: u64,
    pub tables: BTreeMap<String, TableExport>,
}
