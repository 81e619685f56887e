//! Database and table configuration.
//!
//! Plain options structs consumed at construction time; field defaults
//! match the enumerated configuration options a host is expected to
//! override selectively.

use gossipkv_core::{KeyType, Schema};
use gossipkv_store::{ChangeCallback, Validator};
use gossipkv_sync::BroadcastChannel;

/// Options for creating a [`crate::database::DatabaseInstance`].
pub struct DatabaseConfig {
    /// 1-16 characters, unique among live databases.
    pub cluster_id: String,
    /// Non-empty application namespace, carried through to table naming
    /// conventions but otherwise opaque to this crate.
    pub namespace: String,
    /// Broadcast channels this database announces and listens on.
    pub channels: Vec<BroadcastChannel>,
    /// Discovery quiet period, seconds (default 1.0).
    pub discovery_quiet_period: f64,
    /// Discovery max time, seconds (default 3.0).
    pub discovery_max_time: f64,
    /// Fires for every row change in every table, before any table-level
    /// or subscriber callback.
    pub on_change: Option<gossipkv_store::DbChangeCallback>,
    /// Fires when a discovery cycle completes (see
    /// `SyncEngine::set_on_discovery_complete`).
    pub on_discovery_complete: Option<Box<dyn FnMut(bool)>>,
}

impl DatabaseConfig {
    pub fn new(cluster_id: impl Into<String>, namespace: impl Into<String>) -> Self {
        DatabaseConfig {
            cluster_id: cluster_id.into(),
            namespace: namespace.into(),
            channels: vec![
                BroadcastChannel::Guild,
                BroadcastChannel::Raid,
                BroadcastChannel::Party,
                BroadcastChannel::Shout,
            ],
            discovery_quiet_period: 1.0,
            discovery_max_time: 3.0,
            on_change: None,
            on_discovery_complete: None,
        }
    }
}

/// Options for declaring a table on a [`crate::database::DatabaseInstance`].
pub struct TableConfig {
    pub name: String,
    pub key_type: KeyType,
    pub schema: Option<Schema>,
    pub on_validate: Option<Validator>,
    pub on_change: Option<ChangeCallback>,
}

impl TableConfig {
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        TableConfig {
            name: name.into(),
            key_type,
            schema: None,
            on_validate: None,
            on_change: None,
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}
