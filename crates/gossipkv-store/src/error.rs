//! Error types for the versioned store.

use thiserror::Error;

use gossipkv_core::{CoreError, KeyType};

/// Errors that can occur during versioned-store operations.
///
/// Every variant here is a *programmer error*: callers are expected to
/// treat them as fatal at the call site, never forward them over the
/// wire. Row-level validation failures that
/// should instead produce a warning and continue are represented by
/// [`crate::versioned_store::RowWarning`], not by this enum.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table {0:?} already exists")]
    DuplicateTable(String),

    #[error("table {0:?} not found")]
    TableNotFound(String),

    #[error("table name must be non-empty")]
    EmptyTableName,

    #[error("key type mismatch for table {table:?}: expected {expected:?}, got {actual:?}")]
    KeyTypeMismatch {
        table: String,
        expected: KeyType,
        actual: KeyType,
    },

    #[error("insert into table {table:?} failed: key already has a live row")]
    InsertOverLiveKey { table: String },

    #[error("update on table {table:?} failed: no live row for key")]
    NoLiveRow { table: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for versioned-store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
