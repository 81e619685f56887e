//! Errors for the top-level database API.
//!
//! A thin enum that wraps each lower crate's error type plus a handful
//! of variants owned by this crate's own registry/config validation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("cluster id must be 1-16 characters, got {0:?}")]
    InvalidClusterId(String),

    #[error("a database with cluster id {0:?} already exists")]
    DuplicateCluster(String),

    #[error("no database registered under cluster id {0:?}")]
    UnknownCluster(String),

    #[error("peer id must not be the reserved shorthand literal \"=\"")]
    ReservedPeerId,

    #[error(transparent)]
    Store(#[from] gossipkv_store::StoreError),

    #[error(transparent)]
    Sync(#[from] gossipkv_sync::SyncError),

    #[error(transparent)]
    Codec(#[from] gossipkv_codec::CodecError),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
