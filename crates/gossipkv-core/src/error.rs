//! Error types for the gossipkv core data model.

use thiserror::Error;

use crate::value::FieldType;

/// Errors that can occur while building or validating core data-model
/// values: schemas, rows, and versions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("schema field {field:?} declares non-primitive type tag {tag:?}")]
    SchemaNonPrimitiveTag { field: String, tag: String },

    #[error("field {field:?} has type {actual:?}, expected one of {expected:?}")]
    TypeMismatch {
        field: String,
        expected: Vec<FieldType>,
        actual: FieldType,
    },

    #[error("peer id must be non-empty")]
    EmptyPeer,

    #[error(r#"peer id "=" is reserved as storage shorthand and cannot be used directly"#)]
    ReservedPeerLiteral,

    #[error("table name must be non-empty")]
    EmptyTableName,

    #[error("cluster id must be 1-16 characters, got {0}")]
    InvalidClusterIdLength(usize),
}

/// Result type for core data-model operations.
pub type Result<T> = std::result::Result<T, CoreError>;
