//! # gossipkv-sync
//!
//! The anti-entropy sync engine: message framing, channel delivery,
//! ingest debouncing, digest diffing, and the [`engine::SyncEngine`]
//! state machine that ties them together.
//!
//! This crate knows how to talk to peers; it has no opinion on how rows
//! are produced or stored locally, beyond the `gossipkv_store` surface
//! it merges into.

pub mod broker;
pub mod debounce;
pub mod digest;
pub mod engine;
pub mod error;
pub mod messages;

pub use broker::{broadcast_on_available_channels, channel_available, ChannelBroker, ChannelEnvironment};
pub use debounce::{Clock, DebounceBucket, MonotonicSeconds, TimerHandle};
pub use digest::{build_digest, build_rows_response, build_snapshot, compute_missing};
pub use engine::{PeerInfo, SyncEngine};
pub use error::{Result, SyncError};
pub use messages::{
    decode_envelope, encode_envelope, BroadcastChannel, Digest, Envelope, EnvelopeValue, MessageType, Priority,
    RowsPayload, RowsRequest,
};
