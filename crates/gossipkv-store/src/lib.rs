//! # gossipkv-store
//!
//! The schema-validated, version-merged table store: [`VersionedStore`]
//! owns the local Lamport clock and every table's rows, and drives the
//! database-level -> table-level -> subscriber callback fanout order on
//! every write.
//!
//! This crate has no knowledge of peers, wire formats, or sync
//! scheduling; it only knows how to apply a local write or merge an
//! already-decoded remote row.

pub mod error;
pub mod subscriber;
pub mod table;
pub mod versioned_store;

pub use error::{Result, StoreError};
pub use subscriber::{ChangeCallback, SubscriberRegistry, SubscriptionHandle};
pub use table::{Table, TableDescriptor, Validator};
pub use versioned_store::{DbChangeCallback, MergeContext, RowWarning, VersionedStore};
