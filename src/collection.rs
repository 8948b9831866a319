//! The seam between the log and the document store driver.
//!
//! The log only needs a handful of single-document commands from its store: insert, an
//! atomic `$set`/`$unset` update of one document, delete of one document, a filtered scan,
//! and index management. [`DocumentCollection`] captures exactly that. Documents are plain
//! `serde_json` objects; a driver converts them to and from its native representation.

use crate::error::LogError;
use serde_json::Value as JsonValue;
use smallvec::SmallVec;

#[cfg(feature = "memory")]
pub mod memory;

/// A stored document.
pub type Document = serde_json::Map<String, JsonValue>;

/// A conjunction of equality tests on top-level fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, JsonValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the clause `field == value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, JsonValue)] {
        &self.clauses
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| document.get(field) == Some(value))
    }
}

/// A partial update of one document.
///
/// Paths may be dotted (`participants.qg`) to address a field inside a nested object. All
/// entries of one `Update` are applied as one atomic command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
    unset: Vec<String>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// `$set` every field of `document`.
    pub fn set_all(document: Document) -> Self {
        Self {
            set: document,
            unset: Vec::new(),
        }
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.set.insert(path.into(), value.into());
        self
    }

    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.unset.push(path.into());
        self
    }

    pub fn set_fields(&self) -> &Document {
        &self.set
    }

    pub fn unset_fields(&self) -> &[String] {
        &self.unset
    }
}

/// Joins path segments with `.`.
pub fn path(segments: &[&str]) -> String {
    segments.join(".")
}

/// Counts reported by an update command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Counts reported by a delete command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: u64,
}

/// An index as reported by, or requested from, the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    /// Indexed fields in declaration order.
    pub keys: SmallVec<[String; 2]>,
    pub unique: bool,
}

impl IndexSpec {
    /// An ascending index over `keys`, named the way document stores name them by default.
    pub fn ascending(keys: &[&str], unique: bool) -> Self {
        let name = keys
            .iter()
            .map(|key| format!("{key}_1"))
            .collect::<Vec<_>>()
            .join("_");
        Self {
            name,
            keys: keys.iter().map(|key| key.to_string()).collect(),
            unique,
        }
    }

    /// Whether `self` covers exactly the fields in `keys`, in any order.
    pub fn covers_exactly(&self, keys: &[&str]) -> bool {
        self.keys.len() == keys.len() && keys.iter().all(|key| self.keys.iter().any(|k| k == key))
    }
}

/// Iterator over the documents of a scan.
pub type Cursor<'a> = Box<dyn Iterator<Item = Result<Document, LogError>> + 'a>;

/// A collection of documents in some document store.
///
/// Every method is one round trip and one atomic command. Implementations report storage
/// faults as [`LogError::Store`] and unique-index violations as [`LogError::DuplicateKey`].
pub trait DocumentCollection {
    fn list_indexes(&self) -> Result<Vec<IndexSpec>, LogError>;

    fn create_index(&self, index: IndexSpec) -> Result<(), LogError>;

    fn insert_one(&self, document: Document) -> Result<(), LogError>;

    /// Applies `update` to the first document matching `filter`.
    fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateOutcome, LogError>;

    /// Deletes the first document matching `filter`.
    fn delete_one(&self, filter: &Filter) -> Result<DeleteOutcome, LogError>;

    fn find(&self, filter: &Filter) -> Result<Cursor<'_>, LogError>;
}

impl<C: DocumentCollection + ?Sized> DocumentCollection for std::sync::Arc<C> {
    fn list_indexes(&self) -> Result<Vec<IndexSpec>, LogError> {
        (**self).list_indexes()
    }

    fn create_index(&self, index: IndexSpec) -> Result<(), LogError> {
        (**self).create_index(index)
    }

    fn insert_one(&self, document: Document) -> Result<(), LogError> {
        (**self).insert_one(document)
    }

    fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateOutcome, LogError> {
        (**self).update_one(filter, update)
    }

    fn delete_one(&self, filter: &Filter) -> Result<DeleteOutcome, LogError> {
        (**self).delete_one(filter)
    }

    fn find(&self, filter: &Filter) -> Result<Cursor<'_>, LogError> {
        (**self).find(filter)
    }
}
