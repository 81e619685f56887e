//! Sync errors.
//!
//! Every variant here is a network-data error: a malformed or
//! inconsistent inbound message, dropped after `tracing::warn!` and
//! never propagated past [`crate::engine::SyncEngine::ingest`].
//! Programmer errors belong to `gossipkv_store::StoreError`, which
//! this enum wraps rather than duplicates.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to encode envelope: {0}")]
    Encode(String),

    #[error("failed to decode envelope: {0}")]
    Decode(String),

    #[error("envelope references table {0:?}, which is not declared locally")]
    UnknownTable(String),

    #[error(transparent)]
    Store(#[from] gossipkv_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
