//! Digest construction and missing-row computation.
//!
//! A digest is a per-table map of key to version — the replica-
//! comparison primitive anti-entropy builds on, one level more granular
//! than a single per-stream head.

use gossipkv_store::VersionedStore;

use crate::error::Result;
use crate::messages::{Digest, RowsPayload, RowsRequest};

/// Build a digest of every row this store knows about, across every
/// declared table: `{clock, tables: {tableName: {key: version}}}`.
pub fn build_digest(store: &VersionedStore) -> Result<Digest> {
    let mut tables = std::collections::BTreeMap::new();
    for name in store.table_names() {
        let rows = store.snapshot(&name)?;
        let entries = rows.into_iter().map(|(key, row)| (key, row.version)).collect();
        tables.insert(name, entries);
    }
    Ok(Digest { clock: store.clock(), tables })
}

/// Compare an incoming [`Digest`] against this store's own rows and
/// compute the keys this store is missing or holds a stale copy of, per
/// table: for each known table, the set of keys where either (a) we
/// lack the row, or (b) the peer's version is newer by the LWW
/// predicate.
///
/// Tables the incoming digest doesn't mention are left untouched; tables
/// this store doesn't have are ignored (there is nothing to request
/// them into).
pub fn compute_missing(store: &VersionedStore, incoming: &Digest) -> Result<RowsRequest> {
    let mut tables = std::collections::BTreeMap::new();
    for name in store.table_names() {
        let Some(remote_entries) = incoming.tables.get(&name) else {
            continue;
        };
        let mut missing = std::collections::BTreeSet::new();
        for (key, remote_version) in remote_entries {
            let local = store.raw_row(&name, key)?;
            let we_lack_it = match &local {
                None => true,
                Some(row) => remote_version.dominates(Some(&row.version), key),
            };
            if we_lack_it {
                missing.insert(key.clone());
            }
        }
        if !missing.is_empty() {
            tables.insert(name, missing);
        }
    }
    Ok(RowsRequest { tables })
}

/// Build a [`RowsPayload`] answering a [`RowsRequest`]: the requested
/// keys' current rows (live or tombstone), for every table this store
/// has and the request names. Keys the store doesn't have are silently
/// omitted — the requester's digest was current enough to miss them
/// entirely, which can only mean they never existed locally.
pub fn build_rows_response(store: &VersionedStore, request: &RowsRequest) -> Result<RowsPayload> {
    let mut tables = std::collections::BTreeMap::new();
    for (name, keys) in &request.tables {
        let mut rows = std::collections::BTreeMap::new();
        for key in keys {
            if let Some(row) = store.raw_row(name, key)? {
                rows.insert(key.clone(), row);
            }
        }
        if !rows.is_empty() {
            tables.insert(name.clone(), rows);
        }
    }
    Ok(RowsPayload { tables })
}

/// Build a full snapshot: every row of every declared table.
pub fn build_snapshot(store: &VersionedStore) -> Result<RowsPayload> {
    let mut tables = std::collections::BTreeMap::new();
    for name in store.table_names() {
        let rows = store.snapshot(&name)?;
        if !rows.is_empty() {
            tables.insert(name, rows.into_iter().collect());
        }
    }
    Ok(RowsPayload { tables })
}
