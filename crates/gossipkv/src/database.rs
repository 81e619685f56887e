//! The composition root: wires a [`VersionedStore`] to a `SyncEngine`
//! against one set of host-provided collaborators, and exposes the
//! application-facing CRUD/sync/export surface.

use std::collections::BTreeMap;
use std::rc::Rc;

use gossipkv_core::{FieldSchema, Key, Row, RowData};
use gossipkv_codec::{DecodeTable, EncodeTable};
use gossipkv_store::{ChangeCallback, MergeContext, SubscriptionHandle, VersionedStore};
use gossipkv_sync::{ChannelBroker, ChannelEnvironment, Clock, MonotonicSeconds, PeerInfo, SyncEngine, TimerHandle};

use crate::config::{DatabaseConfig, TableConfig};
use crate::error::Result;
use crate::export::{Export, RowExport, TableExport};
use crate::identity::{validated_peer_id, ProcessIdentity};
use crate::timer::HostClock;

/// Adapts a `Rc<dyn HostClock>` to `Rc<dyn Clock>` so the sync engine's
/// constructor never needs to know about the frame-tick extension.
struct ClockFacade(Rc<dyn HostClock>);

impl Clock for ClockFacade {
    fn now(&self) -> MonotonicSeconds {
        self.0.now()
    }

    fn schedule_once(&self, delay: MonotonicSeconds, callback: Box<dyn FnOnce()>) -> TimerHandle {
        self.0.schedule_once(delay, callback)
    }
}

/// One live, in-process replicated database. Owns its table store and
/// its sync engine; everything else (transport, identity, the frame
/// loop) is a collaborator passed in at construction.
pub struct DatabaseInstance {
    cluster_id: String,
    namespace: String,
    store: Rc<VersionedStore>,
    engine: SyncEngine,
}

impl DatabaseInstance {
    /// Build a database against one set of host collaborators. Fails if
    /// `identity.peer_id()` is the reserved shorthand (see
    /// [`crate::identity::validated_peer_id`]).
    pub fn new(
        config: DatabaseConfig,
        identity: &dyn ProcessIdentity,
        broker: Rc<dyn ChannelBroker>,
        env: Rc<dyn ChannelEnvironment>,
        clock: Rc<dyn HostClock>,
    ) -> Result<Self> {
        let peer_id = validated_peer_id(identity)?;
        let store = Rc::new(VersionedStore::new(peer_id.clone()));
        if let Some(on_change) = config.on_change {
            store.set_db_change_callback(on_change);
        }

        let clock_facade: Rc<dyn Clock> = Rc::new(ClockFacade(Rc::clone(&clock)));
        let engine = SyncEngine::new(
            Rc::clone(&store),
            broker,
            env,
            clock_facade,
            peer_id,
            config.channels,
            config.discovery_quiet_period,
            config.discovery_max_time,
        );
        if let Some(on_discovery_complete) = config.on_discovery_complete {
            engine.set_on_discovery_complete(on_discovery_complete);
        }

        let tick_engine = engine.clone();
        clock.on_frame_tick(Box::new(move || tick_engine.tick()));

        Ok(DatabaseInstance {
            cluster_id: config.cluster_id,
            namespace: config.namespace,
            store,
            engine,
        })
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn create_table(&self, config: TableConfig) -> Result<()> {
        self.store
            .new_table(config.name, config.key_type, config.schema, config.on_change, config.on_validate)?;
        Ok(())
    }

    pub fn insert(&self, table: &str, key: Key, data: RowData) -> Result<bool> {
        Ok(self.store.insert(table, key, data)?)
    }

    pub fn set(&self, table: &str, key: Key, data: RowData) -> Result<bool> {
        Ok(self.store.set(table, key, data)?)
    }

    pub fn update(&self, table: &str, key: Key, f: impl FnOnce(RowData) -> RowData) -> Result<bool> {
        Ok(self.store.update(table, key, f)?)
    }

    pub fn get(&self, table: &str, key: &Key) -> Result<Option<RowData>> {
        Ok(self.store.get(table, key)?)
    }

    pub fn has_key(&self, table: &str, key: &Key) -> Result<bool> {
        Ok(self.store.has_key(table, key)?)
    }

    pub fn delete(&self, table: &str, key: Key) -> Result<()> {
        Ok(self.store.delete(table, key)?)
    }

    /// Subscribe to every change on `table`. Unsubscribing is implicit:
    /// dropping the returned handle unregisters the callback (see
    /// `gossipkv_store::SubscriptionHandle`).
    pub fn subscribe(&self, table: &str, callback: ChangeCallback) -> Result<SubscriptionHandle> {
        Ok(self.store.subscribe(table, callback)?)
    }

    /// Start a discovery cycle: broadcast a presence request on every
    /// available channel.
    pub fn discover_peers(&self) -> Result<()> {
        Ok(self.engine.discover_peers()?)
    }

    /// Request a full snapshot from `target`, or from every directory
    /// peer known or suspected to be ahead of us when `target` is `None`.
    pub fn request_snapshot(&self, target: Option<&str>) -> Result<()> {
        Ok(self.engine.request_snapshot(target)?)
    }

    /// Broadcast a fresh digest of this database's rows.
    pub fn sync_now(&self) -> Result<()> {
        Ok(self.engine.sync_now()?)
    }

    pub fn get_discovered_peers(&self) -> Vec<(String, PeerInfo)> {
        self.engine.discovered_peers()
    }

    /// Hand an inbound message from the channel broker's transport to
    /// the sync engine for decoding and dispatch.
    pub fn ingest(&self, bytes: &[u8]) -> Result<()> {
        Ok(self.engine.ingest(bytes)?)
    }

    pub fn get_peer_id(&self) -> &str {
        self.store.local_peer()
    }

    /// Derive a stable peer ID from an external GUID-style identifier,
    /// for hosts whose identity provider keys players by GUID rather
    /// than by the sync-layer peer ID directly. Deterministic: two
    /// processes computing this from the same GUID agree, the same way
    /// `gossipkv_core::BucketedHashSet` relies on FNV agreement across
    /// replicas.
    pub fn get_peer_id_from_guid(&self, guid: &str) -> String {
        format!("{:08x}", gossipkv_core::fnv1a_str(guid, 0))
    }

    /// A table's declared schema, field name to accepted type tags.
    /// `sorted` is accepted for API symmetry with the host environment;
    /// `Schema` is backed by a `BTreeMap` and its fields are always
    /// returned in lexicographic order regardless.
    pub fn get_schema(&self, table: &str, _sorted: bool) -> Result<Option<Vec<(String, FieldSchema)>>> {
        let (_, schema) = self.store.table_info(table)?;
        Ok(schema.map(|schema| schema.fields().map(|(name, field)| (name.clone(), field.clone())).collect()))
    }

    /// Serialize every table to the textual wire grammar.
    /// Fails if any non-empty table has no schema.
    pub fn serialize(&self) -> Result<String> {
        let table_names = self.store.table_names();
        let mut schemas = Vec::with_capacity(table_names.len());
        let mut rows = Vec::with_capacity(table_names.len());
        for name in &table_names {
            let (_, schema) = self.store.table_info(name)?;
            schemas.push(schema.unwrap_or_default());
            rows.push(self.store.snapshot(name)?);
        }
        let row_refs: Vec<Vec<(&Key, &Row)>> = rows.iter().map(|t| t.iter().map(|(k, r)| (k, r)).collect()).collect();
        let tables: Vec<EncodeTable<'_>> = table_names
            .iter()
            .enumerate()
            .map(|(i, name)| EncodeTable {
                name,
                schema: &schemas[i],
                rows: &row_refs[i],
            })
            .collect();
        Ok(gossipkv_codec::serialize(self.store.clock(), &tables)?)
    }

    /// Deserialize `input` against this database's locally declared
    /// tables, merging every decoded row. Structural failures abort
    /// entirely (nothing is applied); per-row problems are returned as
    /// warnings instead.
    pub fn deserialize(&self, input: &str) -> Result<Vec<gossipkv_codec::RowWarning>> {
        let table_names = self.store.table_names();
        let mut key_types = Vec::with_capacity(table_names.len());
        let mut schemas = Vec::with_capacity(table_names.len());
        for name in &table_names {
            let (key_type, schema) = self.store.table_info(name)?;
            key_types.push(key_type);
            schemas.push(schema.unwrap_or_default());
        }
        let decls: Vec<DecodeTable<'_>> = table_names
            .iter()
            .enumerate()
            .map(|(i, name)| DecodeTable {
                name,
                key_type: key_types[i],
                schema: &schemas[i],
            })
            .collect();

        let outcome = gossipkv_codec::deserialize(input, &decls)?;
        let ctx = MergeContext::default();
        for (table, decoded_rows) in outcome.tables {
            for decoded in decoded_rows {
                self.store.merge_row(&table, decoded.key, decoded.row, &ctx)?;
            }
        }
        for warning in &outcome.warnings {
            tracing::warn!(?warning, "row dropped while deserializing");
        }
        Ok(outcome.warnings)
    }

    /// A structured snapshot of every non-empty table, safe to hand to
    /// any external serializer.
    pub fn export(&self) -> Result<Export> {
        let mut tables = BTreeMap::new();
        for name in self.store.table_names() {
            let rows = self.store.snapshot(&name)?;
            if rows.is_empty() {
                continue;
            }
            let mut exported = BTreeMap::new();
            for (key, row) in rows {
                exported.insert(
                    key,
                    RowExport {
                        data: row.data().cloned(),
                        version: row.version.clone(),
                    },
                );
            }
            tables.insert(name, TableExport { rows: exported });
        }
        Ok(Export {
            clock: self.store.clock(),
            tables,
        })
    }

    /// Merge a structured export into this database, as a bulk import:
    /// every row is applied through the same LWW merge predicate as a
    /// `SnapshotResponse`, with fanout suppressed for the whole batch.
    pub fn import(&self, export: Export) -> Result<()> {
        let ctx = MergeContext { suppress_fanout: true };
        for (table, table_export) in export.tables {
            for (key, row_export) in table_export.rows {
                let row = match row_export.data {
                    Some(data) => Row::live(data, row_export.version),
                    None => Row::tombstone(row_export.version),
                };
                self.store.merge_row(&table, key, row, &ctx)?;
            }
        }
        Ok(())
    }
}
