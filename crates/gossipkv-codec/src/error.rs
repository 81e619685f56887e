//! Codec errors. All variants here are fatal for a whole `deserialize`
//! call: structural failures reject the entire document rather than
//! being applied partially. Per-row problems are not represented here;
//! see [`crate::decode::RowWarning`].

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unclosed brace in input")]
    UnclosedBrace,

    #[error("document did not parse to a single top-level group")]
    MalformedDocument,

    #[error("malformed clock value: {0:?}")]
    MalformedClock(String),

    #[error("reference to table {0:?}, which was not declared locally")]
    UndefinedTable(String),

    #[error("table {0:?} rows must each be key{{...}}, found a bare atom")]
    MalformedRow(String),

    #[error("serialization requires a schema; table {0:?} has none")]
    SerializeWithoutSchema(String),

    #[error("writer error: {0}")]
    Write(String),
}

impl From<std::fmt::Error> for CodecError {
    fn from(err: std::fmt::Error) -> Self {
        CodecError::Write(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
