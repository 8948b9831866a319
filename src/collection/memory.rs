//! An in-process [`DocumentCollection`].
//!
//! `MemoryCollection` behaves like a single-node document store as far as the log can tell:
//! every command runs under one lock, so each is atomic; unique indexes are enforced on
//! insert and update; dotted `$set` paths create missing intermediate objects. It is used by
//! the test suite and is handy for embedding the log in tools that do not need durability.
//!
//! Faults can be injected to exercise error paths: [`MemoryCollection::set_unavailable`] fails
//! every command, [`MemoryCollection::fail_scan_after`] breaks the next scan part-way.

use super::{
    Cursor, DeleteOutcome, Document, DocumentCollection, Filter, IndexSpec, Update, UpdateOutcome,
};
use crate::error::{LogError, StoreError};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;

const ID_FIELD: &str = "_id";

#[derive(Debug)]
struct Inner {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
    next_id: u64,
    unavailable: bool,
    fail_scan_after: Option<usize>,
}

#[derive(Debug)]
pub struct MemoryCollection {
    inner: Mutex<Inner>,
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCollection {
    /// An empty collection carrying only the implicit `_id_` index.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                documents: Vec::new(),
                indexes: vec![IndexSpec {
                    name: "_id_".to_string(),
                    ..IndexSpec::ascending(&[ID_FIELD], true)
                }],
                next_id: 1,
                unavailable: false,
                fail_scan_after: None,
            }),
        }
    }

    /// Makes every subsequent command fail with an i/o error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    /// Makes the next scan fail after yielding `documents` documents.
    pub fn fail_scan_after(&self, documents: usize) {
        self.inner.lock().fail_scan_after = Some(documents);
    }

    /// A copy of every stored document, in insertion order.
    pub fn documents(&self) -> Vec<Document> {
        self.inner.lock().documents.clone()
    }

    /// A copy of the first document matching `filter`.
    pub fn find_one(&self, filter: &Filter) -> Option<Document> {
        self.inner
            .lock()
            .documents
            .iter()
            .find(|doc| filter.matches(doc))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    fn check_available(&self) -> Result<(), LogError> {
        if self.unavailable {
            return Err(StoreError::Io("collection is unavailable".to_string()).into());
        }
        Ok(())
    }

    /// Checks `candidate` against every unique index, ignoring the document at `skip`.
    fn check_unique(&self, candidate: &Document, skip: Option<usize>) -> Result<(), LogError> {
        for index in self.indexes.iter().filter(|index| index.unique) {
            let key = index_key(index, candidate);
            let clash = self
                .documents
                .iter()
                .enumerate()
                .filter(|(pos, _)| Some(*pos) != skip)
                .any(|(_, doc)| index_key(index, doc) == key);
            if clash {
                return Err(LogError::DuplicateKey(format!(
                    "{} dup key {:?}",
                    index.name, key
                )));
            }
        }
        Ok(())
    }
}

fn index_key<'a>(index: &IndexSpec, document: &'a Document) -> Vec<Option<&'a JsonValue>> {
    index.keys.iter().map(|key| document.get(key)).collect()
}

fn split_path(path: &str) -> Result<Vec<&str>, LogError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) || segments[0] == ID_FIELD {
        return Err(StoreError::InvalidPath(path.to_string()).into());
    }
    Ok(segments)
}

fn set_path(document: &mut Document, path: &str, value: JsonValue) -> Result<(), LogError> {
    let segments = split_path(path)?;
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
    let mut target = document;
    for segment in parents {
        let child = target
            .entry(segment.to_string())
            .or_insert_with(|| JsonValue::Object(Document::new()));
        target = child
            .as_object_mut()
            .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
    }
    target.insert(last.to_string(), value);
    Ok(())
}

fn unset_path(document: &mut Document, path: &str) -> Result<(), LogError> {
    let segments = split_path(path)?;
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
    let mut target = document;
    for segment in parents {
        match target.get_mut(*segment).and_then(JsonValue::as_object_mut) {
            Some(child) => target = child,
            // unsetting below a missing or scalar field is a no-op
            None => return Ok(()),
        }
    }
    target.remove(*last);
    Ok(())
}

impl DocumentCollection for MemoryCollection {
    fn list_indexes(&self) -> Result<Vec<IndexSpec>, LogError> {
        let inner = self.inner.lock();
        inner.check_available()?;
        Ok(inner.indexes.clone())
    }

    fn create_index(&self, index: IndexSpec) -> Result<(), LogError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;
        if let Some(existing) = inner.indexes.iter().find(|i| i.name == index.name) {
            if *existing == index {
                return Ok(());
            }
            return Err(LogError::Configuration(format!(
                "index {} already exists with different options",
                index.name
            )));
        }
        if index.unique {
            let mut seen = Vec::with_capacity(inner.documents.len());
            for doc in &inner.documents {
                let key = index_key(&index, doc);
                if seen.contains(&key) {
                    return Err(LogError::DuplicateKey(format!(
                        "{} dup key {:?}",
                        index.name, key
                    )));
                }
                seen.push(key);
            }
        }
        inner.indexes.push(index);
        Ok(())
    }

    fn insert_one(&self, mut document: Document) -> Result<(), LogError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;
        if !document.contains_key(ID_FIELD) {
            document.insert(ID_FIELD.to_string(), inner.next_id.into());
            inner.next_id += 1;
        }
        inner.check_unique(&document, None)?;
        inner.documents.push(document);
        Ok(())
    }

    fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateOutcome, LogError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;
        let Some(pos) = inner.documents.iter().position(|doc| filter.matches(doc)) else {
            return Ok(UpdateOutcome::default());
        };

        let mut updated = inner.documents[pos].clone();
        for (path, value) in update.set_fields() {
            set_path(&mut updated, path, value.clone())?;
        }
        for path in update.unset_fields() {
            unset_path(&mut updated, path)?;
        }
        inner.check_unique(&updated, Some(pos))?;

        let modified = updated != inner.documents[pos];
        inner.documents[pos] = updated;
        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    fn delete_one(&self, filter: &Filter) -> Result<DeleteOutcome, LogError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;
        match inner.documents.iter().position(|doc| filter.matches(doc)) {
            Some(pos) => {
                inner.documents.remove(pos);
                Ok(DeleteOutcome { deleted: 1 })
            }
            None => Ok(DeleteOutcome { deleted: 0 }),
        }
    }

    fn find(&self, filter: &Filter) -> Result<Cursor<'_>, LogError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;
        let matching: Vec<Document> = inner
            .documents
            .iter()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect();
        let fail_after = inner.fail_scan_after.take();

        let documents = matching.into_iter().map(Ok);
        let cursor: Cursor<'_> = match fail_after {
            Some(n) => Box::new(documents.take(n).chain(std::iter::once(Err(
                StoreError::Cursor("cursor killed by server".to_string()).into(),
            )))),
            None => Box::new(documents),
        };
        Ok(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: JsonValue) -> Document {
        value.as_object().unwrap().clone()
    }

    fn collection_with_unique_gxid() -> MemoryCollection {
        let collection = MemoryCollection::new();
        collection
            .create_index(IndexSpec::ascending(&["gxid", "system"], true))
            .unwrap();
        collection
    }

    #[test]
    fn unique_index_rejects_duplicate_insert() {
        let collection = collection_with_unique_gxid();
        collection
            .insert_one(doc(json!({"gxid": "AQI", "system": "orderSvc"})))
            .unwrap();
        collection
            .insert_one(doc(json!({"gxid": "AQI", "system": "stockSvc"})))
            .unwrap();
        let err = collection
            .insert_one(doc(json!({"gxid": "AQI", "system": "orderSvc"})))
            .unwrap_err();
        assert!(matches!(err, LogError::DuplicateKey(_)));
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn dotted_set_creates_and_replaces_nested_entries() {
        let collection = collection_with_unique_gxid();
        collection
            .insert_one(doc(json!({"gxid": "AQI", "system": "orderSvc", "participants": {}})))
            .unwrap();
        let filter = Filter::new().eq("gxid", "AQI");

        let outcome = collection
            .update_one(&filter, &Update::new().set("participants.qg", json!({"vote": 0})))
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });

        collection
            .update_one(&filter, &Update::new().set("participants.qw", json!({"vote": 1})))
            .unwrap();
        let outcome = collection
            .update_one(&filter, &Update::new().set("participants.qw", json!({"vote": 1})))
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 0 });

        let stored = collection.find_one(&filter).unwrap();
        assert_eq!(stored["participants"], json!({"qg": {"vote": 0}, "qw": {"vote": 1}}));

        collection
            .update_one(&filter, &Update::new().set("compensables.AA.tried", true))
            .unwrap();
        let stored = collection.find_one(&filter).unwrap();
        assert_eq!(stored["compensables"], json!({"AA": {"tried": true}}));
    }

    #[test]
    fn dotted_unset_removes_only_the_addressed_entry() {
        let collection = MemoryCollection::new();
        collection
            .insert_one(doc(json!({"gxid": "AQI", "participants": {"qg": 1, "qw": 2}})))
            .unwrap();
        let filter = Filter::new().eq("gxid", "AQI");
        let outcome = collection
            .update_one(&filter, &Update::new().unset("participants.qg"))
            .unwrap();
        assert_eq!(outcome.modified, 1);
        let outcome = collection
            .update_one(&filter, &Update::new().unset("nothing.here"))
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 0 });
        assert_eq!(
            collection.find_one(&filter).unwrap()["participants"],
            json!({"qw": 2})
        );
    }

    #[test]
    fn set_below_a_scalar_is_rejected() {
        let collection = MemoryCollection::new();
        collection.insert_one(doc(json!({"status": 1}))).unwrap();
        let err = collection
            .update_one(&Filter::new(), &Update::new().set("status.code", 2))
            .unwrap_err();
        assert!(matches!(err, LogError::Store(StoreError::InvalidPath(_))));
    }

    #[test]
    fn update_and_delete_without_match() {
        let collection = MemoryCollection::new();
        let filter = Filter::new().eq("gxid", "nope");
        assert_eq!(
            collection.update_one(&filter, &Update::new().set("a", 1)).unwrap(),
            UpdateOutcome::default()
        );
        assert_eq!(collection.delete_one(&filter).unwrap().deleted, 0);
    }

    #[test]
    fn conflicting_index_options_are_rejected() {
        let collection = collection_with_unique_gxid();
        collection
            .create_index(IndexSpec::ascending(&["gxid", "system"], true))
            .unwrap();
        let err = collection
            .create_index(IndexSpec::ascending(&["gxid", "system"], false))
            .unwrap_err();
        assert!(matches!(err, LogError::Configuration(_)));
        assert_eq!(collection.list_indexes().unwrap().len(), 2);
    }

    #[test]
    fn injected_faults() {
        let collection = MemoryCollection::new();
        for i in 0..3 {
            collection.insert_one(doc(json!({"n": i}))).unwrap();
        }
        collection.fail_scan_after(1);
        let results: Vec<_> = collection.find(&Filter::new()).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(collection.find(&Filter::new()).unwrap().count(), 3);

        collection.set_unavailable(true);
        assert!(collection.insert_one(Document::new()).is_err());
        assert!(collection.list_indexes().is_err());
        collection.set_unavailable(false);
        assert!(collection.insert_one(Document::new()).is_ok());
    }
}
