//! # gossipkv-testkit
//!
//! Proptest generators and scenario fixtures for gossipkv's testable
//! properties: domain-value strategies for `Value`, `Schema` and `Key`,
//! a concurrent-write parameter type for the LWW merge predicate, and
//! multi-replica fixtures for convergence and codec round-trip
//! scenarios.
//!
//! ## Generators
//!
//! ```
//! use proptest::prelude::*;
//! use gossipkv_testkit::generators::{schema, row_data_for};
//!
//! proptest! {
//!     #[test]
//!     fn row_matches_its_own_schema(
//!         (s, data) in schema(4).prop_flat_map(|s| { let d = row_data_for(&s); (Just(s), d) })
//!     ) {
//!         for (name, field_schema) in s.fields() {
//!             prop_assert!(field_schema.accepted().contains(&data[name].field_type()));
//!         }
//!     }
//! }
//! ```
//!
//! ## Fixtures
//!
//! ```
//! use gossipkv_core::{Key, KeyType};
//! use gossipkv_testkit::fixtures::converge_in_either_order;
//!
//! let (forward, reverse) = converge_in_either_order("users", KeyType::String, None, &[]);
//! assert_eq!(forward, reverse);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{converge_in_either_order, multi_party_fixtures, round_trip_table, TestFixture};
pub use generators::{
    field_name, field_schema, field_type, key, key_type, peer_id, row_data_for, schema, value_of, versions_from,
    ConcurrentWrite,
};
