//! Index maintenance for the transaction collection.

use crate::{
    codec::fields,
    collection::{DocumentCollection, IndexSpec},
    error::{LogError, Result},
};
use tracing::{debug, info};

/// The indexes the log relies on: `(gxid, system)` must be unique so that every application
/// owns at most one archive per global transaction, and `system` backs the recovery scan.
const REQUIRED: [(&[&str], bool); 2] = [
    (&[fields::GLOBAL, fields::SYSTEM], true),
    (&[fields::SYSTEM], false),
];

/// Checks for, and creates, the indexes of a transaction collection.
pub struct IndexManager<'c, C: ?Sized> {
    collection: &'c C,
}

impl<'c, C: DocumentCollection + ?Sized> IndexManager<'c, C> {
    pub fn new(collection: &'c C) -> Self {
        Self { collection }
    }

    /// Makes sure every required index exists with the right uniqueness.
    ///
    /// Running this more than once is harmless. An index over the right keys with the wrong
    /// uniqueness is a [`LogError::Configuration`] fault and is left in place.
    pub fn ensure_indexes(&self) -> Result<()> {
        for (keys, unique) in REQUIRED {
            self.ensure(keys, unique)?;
        }
        Ok(())
    }

    fn ensure(&self, keys: &[&str], unique: bool) -> Result<()> {
        let existing = self.collection.list_indexes()?;
        let matching: Vec<&IndexSpec> = existing
            .iter()
            .filter(|index| index.covers_exactly(keys))
            .collect();
        if let Some(index) = matching.iter().find(|index| index.unique != unique) {
            return Err(LogError::Configuration(format!(
                "index {} over {:?} exists with unique={}, expected unique={unique}",
                index.name, keys, index.unique
            )));
        }
        match matching.first() {
            Some(index) => {
                debug!(index = %index.name, "index present");
                Ok(())
            }
            None => {
                let index = IndexSpec::ascending(keys, unique);
                info!(index = %index.name, unique, "creating index");
                self.collection.create_index(index)
            }
        }
    }
}
