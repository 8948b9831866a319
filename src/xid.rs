//! Transaction identifiers and their storage-key encoding.
//!
//! Identifiers are opaque byte sequences. They never reach the document store as raw bytes:
//! every global and branch identifier is rendered through [`encode`] first, and the rendered
//! string is what ends up in filters, field values and dotted update paths.
//!
//! The encoding is unpadded URL-safe base64. Its alphabet (`A-Z a-z 0-9 - _`) contains
//! neither `.` nor `$`, so an encoded key can always be used as one segment of a dotted
//! path, and there is exactly one encoding per byte sequence, so it is usable as an
//! exact-match query key.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use std::fmt;
use thiserror::Error;

/// Error returned when a stored key is not a valid encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{key}` is not a valid identifier key: {reason}")]
pub struct XidDecodeError {
    key: String,
    reason: String,
}

/// Encodes an identifier into its storage key.
pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes a storage key produced by [`encode`].
pub fn decode(key: &str) -> Result<Vec<u8>, XidDecodeError> {
    URL_SAFE_NO_PAD
        .decode(key)
        .map_err(|err| XidDecodeError {
            key: key.to_string(),
            reason: err.to_string(),
        })
}

/// A global transaction identifier, optionally narrowed to one branch.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Xid {
    global: Vec<u8>,
    branch: Option<Vec<u8>>,
}

impl Xid {
    /// Creates an identifier for a whole global transaction.
    pub fn global(global: impl Into<Vec<u8>>) -> Self {
        Self {
            global: global.into(),
            branch: None,
        }
    }

    /// Creates the identifier of one branch of a global transaction.
    pub fn branch(global: impl Into<Vec<u8>>, branch: impl Into<Vec<u8>>) -> Self {
        Self {
            global: global.into(),
            branch: Some(branch.into()),
        }
    }

    /// Generates a fresh global identifier.
    ///
    /// The 16 bytes are a ULID, so identifiers generated by one process sort roughly by
    /// creation time.
    pub fn generate() -> Self {
        Self::global(ulid::Ulid::new().to_bytes().to_vec())
    }

    /// Returns the branch identifier of `self` under the same global transaction.
    pub fn with_branch(&self, branch: impl Into<Vec<u8>>) -> Self {
        Self::branch(self.global.clone(), branch)
    }

    /// Drops the branch qualifier, if any.
    pub fn to_global(&self) -> Self {
        Self::global(self.global.clone())
    }

    pub fn global_id(&self) -> &[u8] {
        &self.global
    }

    pub fn branch_id(&self) -> Option<&[u8]> {
        self.branch.as_deref()
    }

    /// The storage key of the global part.
    pub fn global_key(&self) -> String {
        encode(&self.global)
    }

    /// The storage key of the branch part, if there is one.
    pub fn branch_key(&self) -> Option<String> {
        self.branch_id().map(encode)
    }
}

impl fmt::Debug for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.branch_id() {
            Some(branch) => write!(f, "{:02X?}/{:02X?}", self.global, branch),
            None => write!(f, "{:02X?}", self.global),
        }
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.branch_key() {
            Some(branch) => write!(f, "{}/{}", self.global_key(), branch),
            None => f.write_str(&self.global_key()),
        }
    }
}
