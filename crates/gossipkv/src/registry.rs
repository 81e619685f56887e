//! The cluster-ID-to-database registry.
//!
//! The host environment this crate embeds in treats the cluster-ID-to-
//! database map as process-wide global state. Rather than a `static`
//! (which would force `Sync`/interior-locking for no reason in a
//! single-threaded host), this is an explicit `Registry` value the host
//! owns and passes around — module-scoped state scoped to whatever the
//! host chooses to hold one in, instead of to the process.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::database::DatabaseInstance;
use crate::error::{DatabaseError, Result};

const MIN_CLUSTER_ID_LEN: usize = 1;
const MAX_CLUSTER_ID_LEN: usize = 16;

/// Owns every live [`DatabaseInstance`] for a given host, keyed by
/// cluster ID. `init` rejects a duplicate cluster ID (programmer
/// error); `teardown` is the only way to free a slot.
#[derive(Default)]
pub struct Registry {
    databases: RefCell<HashMap<String, Rc<DatabaseInstance>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    fn validate_cluster_id(cluster_id: &str) -> Result<()> {
        if cluster_id.len() < MIN_CLUSTER_ID_LEN || cluster_id.len() > MAX_CLUSTER_ID_LEN {
            return Err(DatabaseError::InvalidClusterId(cluster_id.to_string()));
        }
        Ok(())
    }

    /// Register `database` under its own cluster ID. Fails if the ID is
    /// out of range or already taken.
    pub fn init(&self, database: Rc<DatabaseInstance>) -> Result<()> {
        let cluster_id = database.cluster_id().to_string();
        Self::validate_cluster_id(&cluster_id)?;
        let mut databases = self.databases.borrow_mut();
        if databases.contains_key(&cluster_id) {
            return Err(DatabaseError::DuplicateCluster(cluster_id));
        }
        databases.insert(cluster_id, database);
        Ok(())
    }

    pub fn get(&self, cluster_id: &str) -> Option<Rc<DatabaseInstance>> {
        self.databases.borrow().get(cluster_id).cloned()
    }

    /// Drop the database registered under `cluster_id`. A no-op if
    /// nothing is registered there (teardown is idempotent).
    pub fn teardown(&self, cluster_id: &str) {
        self.databases.borrow_mut().remove(cluster_id);
    }

    pub fn cluster_ids(&self) -> Vec<String> {
        self.databases.borrow().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::identity::ProcessIdentity;
    use gossipkv_sync::{ChannelBroker, ChannelEnvironment};
    use std::rc::Rc as StdRc;

    struct NullBroker;
    impl ChannelBroker for NullBroker {
        fn send_unicast(&self, _target: &str, _bytes: &[u8], _priority: gossipkv_sync::Priority) {}
        fn send_broadcast(&self, _channel: gossipkv_sync::BroadcastChannel, _bytes: &[u8], _priority: gossipkv_sync::Priority) {}
    }
    struct NullEnv;
    impl ChannelEnvironment for NullEnv {
        fn in_guild(&self) -> bool {
            false
        }
        fn in_raid(&self) -> bool {
            false
        }
        fn in_group(&self) -> bool {
            false
        }
        fn in_instance(&self) -> bool {
            true
        }
    }
    struct FixedIdentity;
    impl ProcessIdentity for FixedIdentity {
        fn player_name(&self) -> String {
            "tester".to_string()
        }
        fn peer_id(&self) -> String {
            "p1".to_string()
        }
    }

    fn database(cluster_id: &str) -> StdRc<DatabaseInstance> {
        StdRc::new(
            DatabaseInstance::new(
                DatabaseConfig::new(cluster_id, "ns"),
                &FixedIdentity,
                StdRc::new(NullBroker),
                StdRc::new(NullEnv),
                crate::timer::ManualHostClock::new(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn init_then_get_round_trips() {
        let registry = Registry::new();
        registry.init(database("c1")).unwrap();
        assert!(registry.get("c1").is_some());
    }

    #[test]
    fn duplicate_cluster_id_is_rejected() {
        let registry = Registry::new();
        registry.init(database("c1")).unwrap();
        let err = registry.init(database("c1")).unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateCluster(_)));
    }

    #[test]
    fn cluster_id_length_is_validated() {
        let registry = Registry::new();
        let err = registry.init(database("")).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidClusterId(_)));
        let err = registry.init(database("this-cluster-id-is-too-long")).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidClusterId(_)));
    }

    #[test]
    fn teardown_frees_the_slot_for_reuse() {
        let registry = Registry::new();
        registry.init(database("c1")).unwrap();
        registry.teardown("c1");
        assert!(registry.get("c1").is_none());
        registry.init(database("c1")).unwrap();
    }
}
