//! # gossipkv-core
//!
//! Pure data model and probabilistic structures for gossipkv: the
//! primitive value domain, schemas, rows and versions, FNV-1a hashing,
//! and the three approximate-membership/divergence-detection structures
//! anti-entropy sync relies on.
//!
//! This crate contains no I/O and no networking; everything here is
//! deterministic computation over in-memory values, so that two replicas
//! running the same algorithm always agree.
//!
//! ## Key Types
//!
//! - [`Value`] / [`Key`] / [`FieldType`] / [`KeyType`] - the primitive
//!   value domain and typed primary keys.
//! - [`Schema`] / [`schema_copy`] - per-field type checking and
//!   projection.
//! - [`Version`] - Lamport clock + peer + tombstone flag, with the LWW
//!   merge predicate.
//! - [`Row`] - version-stamped data, or a tombstone.
//! - [`BucketedHashSet`] / [`BloomFilter`] / [`CuckooFilter`] -
//!   divergence detection and approximate membership for anti-entropy.

pub mod bloom;
pub mod bucketed;
pub mod cuckoo;
pub mod error;
pub mod hash;
pub mod row;
pub mod schema;
pub mod value;
pub mod version;

pub use bloom::BloomFilter;
pub use bucketed::BucketedHashSet;
pub use cuckoo::CuckooFilter;
pub use error::{CoreError, Result};
pub use hash::{fnv1a_bytes, fnv1a_str};
pub use row::Row;
pub use schema::{schema_copy, FieldSchema, RowData, Schema};
pub use value::{FieldType, Key, KeyType, Value};
pub use version::{Version, PEER_SELF_SHORTHAND};
