//! # gossipkv
//!
//! An embeddable, in-process, P2P replicated key-value database:
//! schema-validated tables with last-writer-wins merge, anti-entropy
//! gossip sync over a host-provided transport, and a textual export
//! format for interop with any external encoder.
//!
//! [`database::DatabaseInstance`] is the composition root; [`registry::Registry`]
//! is the optional cluster-ID-keyed map a host uses to manage more than
//! one live database. Everything this crate consumes from its host
//! (transport, process identity, the frame loop, environment queries)
//! is an explicit trait, never global state.

pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod identity;
pub mod registry;
pub mod timer;

pub use config::{DatabaseConfig, TableConfig};
pub use database::DatabaseInstance;
pub use error::{DatabaseError, Result};
pub use export::{Export, RowExport, TableExport};
pub use identity::ProcessIdentity;
pub use registry::Registry;
pub use timer::{HostClock, ManualHostClock};

pub use gossipkv_core::{FieldSchema, FieldType, Key, KeyType, RowData, Schema, Value};
pub use gossipkv_store::{ChangeCallback, SubscriptionHandle};
pub use gossipkv_sync::{BroadcastChannel, ChannelBroker, ChannelEnvironment, PeerInfo};
