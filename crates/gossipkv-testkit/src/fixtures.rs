//! Scenario fixtures built on [`VersionedStore`], covering the
//! multi-replica setups gossipkv's testable properties exercise: LWW
//! convergence regardless of merge order, and codec round-tripping.

use gossipkv_core::{Key, KeyType, Row, Schema};
use gossipkv_store::{MergeContext, VersionedStore};

/// One replica: a freshly constructed store plus the peer ID it was
/// built with, ready to have tables declared on it.
pub struct TestFixture {
    pub peer: String,
    pub store: VersionedStore,
}

impl TestFixture {
    pub fn new(peer: impl Into<String>) -> Self {
        let peer = peer.into();
        TestFixture {
            store: VersionedStore::new(peer.clone()),
            peer,
        }
    }

    /// Declare a table on this fixture's store, consuming and returning
    /// `self` for chaining at the call site.
    pub fn with_table(self, name: &str, key_type: KeyType, schema: Option<Schema>) -> Self {
        self.store
            .new_table(name, key_type, schema, None, None)
            .expect("table declaration is infallible for a fresh fixture");
        self
    }
}

/// Build `count` replicas with distinct, deterministic peer IDs
/// (`p0`, `p1`, ...), all declaring the same table, for tests
/// exercising convergence across more than two participants.
pub fn multi_party_fixtures(count: usize, table: &str, key_type: KeyType, schema: Option<Schema>) -> Vec<TestFixture> {
    (0..count)
        .map(|i| TestFixture::new(format!("p{i}")).with_table(table, key_type, schema.clone()))
        .collect()
}

/// Feed the same batch of remote rows into two freshly built replicas
/// in opposite arrival orders and return each replica's final snapshot
/// of `table`.
///
/// Grounds LWW closure: `merge_row` only ever replaces
/// the stored version with one that dominates it, so the row surviving
/// at each key is the maximum under [`Version::dominates`][d] regardless
/// of the order the writes arrived in — the two snapshots this returns
/// are expected to be equal.
///
/// [d]: gossipkv_core::Version::dominates
pub fn converge_in_either_order(
    table: &str,
    key_type: KeyType,
    schema: Option<Schema>,
    writes: &[(Key, Row)],
) -> (Vec<(Key, Row)>, Vec<(Key, Row)>) {
    let forward = TestFixture::new("observer-a").with_table(table, key_type, schema.clone());
    for (key, row) in writes {
        forward
            .store
            .merge_row(table, key.clone(), row.clone(), &MergeContext::default())
            .expect("table was just declared on this fixture");
    }

    let reverse = TestFixture::new("observer-b").with_table(table, key_type, schema);
    for (key, row) in writes.iter().rev() {
        reverse
            .store
            .merge_row(table, key.clone(), row.clone(), &MergeContext::default())
            .expect("table was just declared on this fixture");
    }

    (
        forward.store.snapshot(table).expect("table exists"),
        reverse.store.snapshot(table).expect("table exists"),
    )
}

/// Serialize every row of `table` out of `source` through the textual
/// wire codec and merge the decoded rows into `target` (which must
/// already declare the same table and schema).
///
/// Grounds codec round-tripping: every row decoded back out
/// should be LWW-equivalent to the row `source` held, so replaying them
/// into `target` is expected to produce no schema-rejection warnings
/// and a snapshot identical to `source`'s.
pub fn round_trip_table(source: &VersionedStore, target: &VersionedStore, table: &str) -> Vec<gossipkv_codec::RowWarning> {
    let (key_type, schema) = source.table_info(table).expect("table exists on source");
    let schema = schema.unwrap_or_default();
    let rows = source.snapshot(table).expect("table exists on source");
    let row_refs: Vec<(&Key, &Row)> = rows.iter().map(|(k, r)| (k, r)).collect();

    let encoded = gossipkv_codec::serialize(
        source.clock(),
        &[gossipkv_codec::EncodeTable {
            name: table,
            schema: &schema,
            rows: &row_refs,
        }],
    )
    .expect("source rows already satisfy their own table's schema");

    let outcome = gossipkv_codec::deserialize(
        &encoded,
        &[gossipkv_codec::DecodeTable {
            name: table,
            key_type,
            schema: &schema,
        }],
    )
    .expect("a document this function just encoded is always well-formed");

    let ctx = MergeContext::default();
    for (decoded_table, decoded_rows) in outcome.tables {
        debug_assert_eq!(decoded_table, table);
        for decoded in decoded_rows {
            if let Some(warning) = target
                .merge_row(table, decoded.key, decoded.row, &ctx)
                .expect("table exists on target")
            {
                panic!("unexpected schema rejection replaying an already-validated row: {warning:?}");
            }
        }
    }
    outcome.warnings
}
