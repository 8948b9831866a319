//! Error types for the transaction log.
//!
//! Every fault the log can produce is a [`LogError`]. Callers that need to pick a
//! rollback policy should match on [`LogError::kind`] rather than on the variants, since
//! several variants map onto the same [`FaultKind`].

use crate::{timestamp::TimestampError, xid::XidDecodeError};
use thiserror::Error;

pub type Result<T, E = LogError> = std::result::Result<T, E>;

/// The coarse classification of a [`LogError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Conflicting setup (bad index, bad endpoint). Fatal at initialization.
    Configuration,
    /// An operation expected exactly one matching document and saw a different count.
    Consistency,
    /// Values could not be serialized on the write path.
    Encoding,
    /// A stored archive could not be turned back into domain objects.
    Decoding,
    /// The storage call itself failed.
    TransientStore,
}

#[derive(Error, Debug)]
pub enum LogError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{operation} matched {matched} documents, expected exactly one")]
    Consistency {
        operation: &'static str,
        matched: u64,
    },
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("no live epoch is known for application {0}")]
    EpochUnavailable(String),
}

impl LogError {
    pub fn kind(&self) -> FaultKind {
        match self {
            LogError::Configuration(_) => FaultKind::Configuration,
            LogError::Consistency { .. } | LogError::EpochUnavailable(_) => {
                FaultKind::Consistency
            }
            LogError::Encoding(_) => FaultKind::Encoding,
            LogError::Decoding(_) => FaultKind::Decoding,
            LogError::Store(_) | LogError::DuplicateKey(_) => FaultKind::TransientStore,
        }
    }
}

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("failed to serialize {what}: {source}")]
    Blob {
        what: &'static str,
        #[source]
        source: postcard::Error,
    },
    #[error("failed to render variables as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("branch identifier of {0} is empty")]
    EmptyBranch(&'static str),
    #[error("{what} {branch} does not belong to global transaction {global}")]
    ForeignBranch {
        what: &'static str,
        branch: String,
        global: String,
    },
    #[error("{what} {branch} is filed under branch key {key}")]
    MisfiledBranch {
        what: &'static str,
        branch: String,
        key: String,
    },
}

#[derive(Error, Debug)]
pub enum DecodingError {
    #[error("field `{0}` is missing")]
    MissingField(&'static str),
    #[error("field `{field}` has an unexpected type, expected {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("malformed identifier in `{field}`: {source}")]
    Xid {
        field: &'static str,
        #[source]
        source: XidDecodeError,
    },
    #[error("malformed blob in `{field}`")]
    Blob {
        field: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("malformed timestamp in `{field}`: {source}")]
    Timestamp {
        field: &'static str,
        #[source]
        source: TimestampError,
    },
    #[error("resource {identifier} resolved to type {resolved}, stored type is {stored}")]
    DescriptorMismatch {
        identifier: String,
        stored: String,
        resolved: String,
    },
    #[error("no compensable method registered for {interface}#{signature}")]
    UnresolvedMethod { interface: String, signature: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("i/o failure: {0}")]
    Io(String),
    #[error("invalid update path `{0}`")]
    InvalidPath(String),
    #[error("cursor failed: {0}")]
    Cursor(String),
}
