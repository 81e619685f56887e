//! Rows: a version-stamped slice of table data, or a tombstone.

use serde::{Deserialize, Serialize};

use crate::schema::RowData;
use crate::version::Version;

/// A single row: either live data with a version, or a tombstone (no
/// data) with a version whose `tombstone` flag is set.
///
/// Invariant: `data.is_none() <=> version.tombstone`. The two
/// constructors are the only way to build a [`Row`], so the invariant
/// holds by construction rather than by runtime check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    data: Option<RowData>,
    pub version: Version,
}

impl Row {
    /// A live row carrying `data`. Panics in debug builds if `version`
    /// claims to be a tombstone — that combination violates the
    /// invariant and indicates a bug in the caller, not a recoverable
    /// runtime error.
    pub fn live(data: RowData, version: Version) -> Self {
        debug_assert!(!version.tombstone, "live row with tombstone version");
        Row {
            data: Some(data),
            version,
        }
    }

    /// A tombstone row: no data, version must have `tombstone == true`.
    pub fn tombstone(version: Version) -> Self {
        debug_assert!(version.tombstone, "tombstone row without tombstone version");
        Row {
            data: None,
            version,
        }
    }

    /// This row's data, or `None` if it's a tombstone.
    pub fn data(&self) -> Option<&RowData> {
        self.data.as_ref()
    }

    pub fn is_tombstone(&self) -> bool {
        self.version.tombstone
    }
}
