//! Loading a corpus into a memory store.
//!
//! Every string property of an object is whitespace-tokenized and indexed:
//! one posting row per (property, term), holding `(doc id, frequency)` pairs,
//! and one row hash per posting row in the property's hash bucket. Objects
//! are stored as JSON under their external id with the document id as
//! secondary key.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, info};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::analysis::{Tokenizer, WhitespaceTokenizer};
use crate::bm25::checksum::row_hash;
use crate::bm25::posting::{PostingEntry, decode_row};
use crate::bm25::scoring::MemoryDocumentLengths;
use crate::error::{KwrankError, Result, ResultExt};
use crate::object::{JsonObjectDecoder, StoredObject};
use crate::storage::{
    Bucket, DOC_ID_SECONDARY_INDEX, MemoryStore, OBJECTS_BUCKET, doc_id_key, hash_bucket,
    property_bucket,
};

/// Field of a corpus record holding the external object id.
pub const ID_FIELD: &str = "id";

/// Writes objects and their index rows into a [`MemoryStore`].
#[derive(Debug)]
pub struct CorpusLoader {
    store: Arc<MemoryStore>,
    tokenizer: WhitespaceTokenizer,
    lengths: Arc<MemoryDocumentLengths>,
    next_doc_id: u64,
}

impl CorpusLoader {
    /// Create a loader writing into `store`. Document ids start at 1.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        store.create_bucket(OBJECTS_BUCKET);
        CorpusLoader {
            store,
            tokenizer: WhitespaceTokenizer::new(),
            lengths: Arc::new(MemoryDocumentLengths::new()),
            next_doc_id: 1,
        }
    }

    /// The store being written.
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// Token counts of every indexed property value.
    pub fn lengths(&self) -> Arc<MemoryDocumentLengths> {
        Arc::clone(&self.lengths)
    }

    /// Add a record, assigning it the next document id.
    ///
    /// The external id is taken from the `id` field when it is a string and
    /// defaults to the document id otherwise.
    pub fn add(&mut self, mut properties: Map<String, Value>) -> Result<u64> {
        let doc_id = self.next_doc_id;
        let id = match properties.remove(ID_FIELD) {
            Some(Value::String(id)) => id,
            Some(other) => other.to_string(),
            None => doc_id.to_string(),
        };

        let mut object = StoredObject::new(id, doc_id);
        object.properties = properties;
        self.add_object(&object)?;
        Ok(doc_id)
    }

    /// Add an object under its own document id.
    ///
    /// An object already stored under the same external id is replaced: its
    /// postings, hashes and lengths are removed before the new ones are
    /// written.
    pub fn add_object(&mut self, object: &StoredObject) -> Result<()> {
        let next_doc_id = object.doc_id.checked_add(1).ok_or_else(|| {
            KwrankError::invalid_query(format!("doc id {} is out of range", object.doc_id))
        })?;

        let objects = self.store.create_bucket(OBJECTS_BUCKET);
        if let Some(raw) = objects.get(object.id.as_bytes())? {
            let previous: StoredObject = serde_json::from_slice(&raw)?;
            debug!(
                "replacing object {} (doc id {} -> {})",
                previous.id, previous.doc_id, object.doc_id
            );
            self.unindex(&previous)?;
        }

        let raw = JsonObjectDecoder::encode(object)?;
        objects.put_with_secondary(
            object.id.as_bytes(),
            &[&doc_id_key(object.doc_id)[..]],
            raw,
        );

        for (property, value) in &object.properties {
            let Some(text) = value.as_str() else {
                continue;
            };
            self.index_text(property, object.doc_id, text)?;
        }

        self.next_doc_id = self.next_doc_id.max(next_doc_id);
        Ok(())
    }

    /// Remove the postings and lengths `object` contributed.
    fn unindex(&self, object: &StoredObject) -> Result<()> {
        let pair_key = doc_id_key(object.doc_id);
        for (property, value) in &object.properties {
            let Some(text) = value.as_str() else {
                continue;
            };
            let Some(index) = self.store.memory_bucket(&property_bucket(property)) else {
                continue;
            };
            let mut terms = self.tokenizer.tokenize(text)?;
            terms.sort_unstable();
            terms.dedup();
            for term in &terms {
                if index.remove_map_pair(term.as_bytes(), &pair_key) {
                    self.rehash_row(property, term)?;
                }
            }
        }
        self.lengths.remove(object.doc_id);
        Ok(())
    }

    fn index_text(&self, property: &str, doc_id: u64, text: &str) -> Result<()> {
        let terms = self.tokenizer.tokenize(text)?;
        self.lengths.record(property, doc_id, terms.len() as f64);

        let mut frequencies: AHashMap<&str, f64> = AHashMap::new();
        for term in &terms {
            *frequencies.entry(term.as_str()).or_insert(0.0) += 1.0;
        }

        let index = self.store.create_bucket(&property_bucket(property));
        self.store.create_bucket(&hash_bucket(property));
        for (term, frequency) in frequencies {
            let pair = PostingEntry::new(doc_id, frequency).to_pair();
            index.append_map(term.as_bytes(), vec![pair]);
            self.rehash_row(property, term)?;
        }
        Ok(())
    }

    /// Recompute the stored hash of one posting row from its current pairs.
    pub fn rehash_row(&self, property: &str, term: &str) -> Result<()> {
        let index = self
            .store
            .memory_bucket(&property_bucket(property))
            .ok_or_else(|| KwrankError::missing_bucket(property_bucket(property)))?;
        let hashes = self.store.create_bucket(&hash_bucket(property));

        let pairs = index.map_list(term.as_bytes())?;
        if pairs.is_empty() {
            hashes.delete(term.as_bytes());
        } else {
            hashes.put(term.as_bytes(), row_hash(&pairs));
        }
        Ok(())
    }

    /// Remove the stored object of `doc_id`, leaving its postings behind as
    /// a tombstone would. Returns whether an object was removed.
    pub fn remove_object(&self, doc_id: u64) -> Result<bool> {
        let objects = self.store.create_bucket(OBJECTS_BUCKET);
        let raw = objects.get_by_secondary(DOC_ID_SECONDARY_INDEX, &doc_id_key(doc_id))?;
        let Some(raw) = raw else {
            return Ok(false);
        };
        let object: StoredObject = serde_json::from_slice(&raw)?;
        self.lengths.remove(doc_id);
        Ok(objects.delete(object.id.as_bytes()))
    }

    /// Load newline-delimited JSON objects. Blank lines are skipped.
    pub fn load_jsonl<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let mut loaded = 0;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Map<String, Value> = serde_json::from_str(&line)
                .map_err(KwrankError::from)
                .with_context(|| format!("parse corpus line {}", line_no + 1))?;
            let doc_id = self.add(record)?;
            debug!("loaded line {} as doc id {doc_id}", line_no + 1);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Load a JSONL corpus file.
    pub fn load_jsonl_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(KwrankError::from)
            .with_context(|| format!("open corpus {}", path.display()))?;
        let loaded = self.load_jsonl(BufReader::new(file))?;
        info!("loaded {loaded} objects from {}", path.display());
        Ok(loaded)
    }
}

/// Index statistics of one property.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertyStats {
    /// Stored objects.
    pub documents: u64,
    /// Distinct terms (posting rows).
    pub terms: u64,
    /// Postings across all rows.
    pub postings: u64,
    /// Rows with the most postings, most frequent first.
    pub top_terms: Vec<(String, u64)>,
}

/// Collect statistics of `property`'s index, listing up to `top` terms.
pub fn property_stats(store: &MemoryStore, property: &str, top: usize) -> Result<PropertyStats> {
    let objects = store
        .memory_bucket(OBJECTS_BUCKET)
        .ok_or_else(|| KwrankError::missing_bucket(OBJECTS_BUCKET))?;
    let index = store
        .memory_bucket(&property_bucket(property))
        .ok_or_else(|| KwrankError::missing_bucket(property_bucket(property)))?;

    let mut stats = PropertyStats {
        documents: objects.count()?,
        ..PropertyStats::default()
    };
    let mut rows: Vec<(String, u64)> = Vec::new();
    index.scan_map(None, &mut |key, pairs| {
        let postings = decode_row(key, pairs)?.len() as u64;
        stats.terms += 1;
        stats.postings += postings;
        rows.push((String::from_utf8_lossy(key).into_owned(), postings));
        Ok(true)
    })?;

    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.truncate(top);
    stats.top_terms = rows;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;
    use crate::bm25::scoring::DocumentLengthProvider;
    use crate::storage::Store;

    fn loader() -> CorpusLoader {
        CorpusLoader::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_load_jsonl_indexes_string_properties() {
        let mut loader = loader();
        let corpus = r#"{"id":"a","title":"cat cat dog","year":2020}

{"title":"dog"}
"#;
        assert_eq!(loader.load_jsonl(Cursor::new(corpus)).unwrap(), 2);

        let store = loader.store();
        let index = store.bucket(&property_bucket("title")).unwrap();
        let cat = decode_row(b"cat", &index.map_list(b"cat").unwrap()).unwrap();
        assert_eq!(cat, vec![PostingEntry::new(1, 2.0)]);
        let dog = decode_row(b"dog", &index.map_list(b"dog").unwrap()).unwrap();
        assert_eq!(dog.len(), 2);

        assert!(store.bucket(&property_bucket("year")).is_none());
        assert!(store.bucket(&hash_bucket("title")).unwrap().get(b"cat").unwrap().is_some());
        assert_eq!(loader.lengths().doc_length("title", 1).unwrap(), 3.0);

        let objects = store.bucket(OBJECTS_BUCKET).unwrap();
        assert!(objects.get(b"a").unwrap().is_some());
        assert!(objects.get(b"2").unwrap().is_some());
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let mut loader = loader();
        let err = loader
            .load_jsonl(Cursor::new("{\"title\":\"ok\"}\nnot json\n"))
            .unwrap_err();
        assert!(err.to_string().contains("parse corpus line 2"));
    }

    #[test]
    fn test_rehash_follows_row_changes() {
        let mut loader = loader();
        loader
            .add_object(&StoredObject::new("x", 4).with_property("title", json!("cat")))
            .unwrap();
        let store = loader.store();
        let hashes = store.bucket(&hash_bucket("title")).unwrap();
        let before = hashes.get(b"cat").unwrap();

        store
            .memory_bucket(&property_bucket("title"))
            .unwrap()
            .append_map(b"cat", vec![PostingEntry::new(4, 9.0).to_pair()]);
        loader.rehash_row("title", "cat").unwrap();
        assert_ne!(hashes.get(b"cat").unwrap(), before);
    }

    #[test]
    fn test_remove_object_keeps_postings() {
        let mut loader = loader();
        let doc_id = loader
            .add(json!({"title": "cat"}).as_object().unwrap().clone())
            .unwrap();
        assert!(loader.remove_object(doc_id).unwrap());
        assert!(!loader.remove_object(doc_id).unwrap());

        let store = loader.store();
        assert_eq!(store.bucket(OBJECTS_BUCKET).unwrap().count().unwrap(), 0);
        let index = store.bucket(&property_bucket("title")).unwrap();
        assert_eq!(index.map_list(b"cat").unwrap().len(), 1);
    }

    #[test]
    fn test_property_stats() {
        let mut loader = loader();
        loader
            .load_jsonl(Cursor::new(
                "{\"title\":\"cat dog\"}\n{\"title\":\"cat\"}\n{\"title\":\"emu\"}\n",
            ))
            .unwrap();

        let stats = property_stats(&loader.store(), "title", 2).unwrap();
        assert_eq!(stats.documents, 3);
        assert_eq!(stats.terms, 3);
        assert_eq!(stats.postings, 4);
        assert_eq!(
            stats.top_terms,
            vec![("cat".to_string(), 2), ("dog".to_string(), 1)]
        );
    }

    #[test]
    fn test_duplicate_external_id_replaces_object() {
        let mut loader = loader();
        loader
            .load_jsonl(Cursor::new(
                "{\"id\":\"a\",\"title\":\"cat\"}\n{\"id\":\"a\",\"title\":\"cat dog\"}\n",
            ))
            .unwrap();

        let store = loader.store();
        let index = store.bucket(&property_bucket("title")).unwrap();
        let cat = decode_row(b"cat", &index.map_list(b"cat").unwrap()).unwrap();
        assert_eq!(cat, vec![PostingEntry::new(2, 1.0)]);

        let objects = store.bucket(OBJECTS_BUCKET).unwrap();
        assert_eq!(objects.count().unwrap(), 1);
        assert!(
            objects
                .get_by_secondary(DOC_ID_SECONDARY_INDEX, &doc_id_key(1))
                .unwrap()
                .is_none()
        );

        let hashes = store.bucket(&hash_bucket("title")).unwrap();
        assert_eq!(
            hashes.get(b"cat").unwrap(),
            Some(row_hash(&index.map_list(b"cat").unwrap()))
        );
        assert_eq!(loader.lengths().average_length("title").unwrap(), 2.0);
    }

    #[test]
    fn test_replacing_drops_emptied_rows() {
        let mut loader = loader();
        loader
            .add_object(&StoredObject::new("x", 1).with_property("title", json!("emu")))
            .unwrap();
        loader
            .add_object(&StoredObject::new("x", 2).with_property("title", json!("cat")))
            .unwrap();

        let store = loader.store();
        let index = store.bucket(&property_bucket("title")).unwrap();
        assert!(index.map_list(b"emu").unwrap().is_empty());
        assert_eq!(index.map_list(b"cat").unwrap().len(), 1);
        let hashes = store.bucket(&hash_bucket("title")).unwrap();
        assert!(hashes.get(b"emu").unwrap().is_none());
    }

    #[test]
    fn test_max_doc_id_is_rejected() {
        let mut loader = loader();
        let err = loader
            .add_object(&StoredObject::new("last", u64::MAX).with_property("title", json!("cat")))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidQuery);
        assert_eq!(loader.store().bucket(OBJECTS_BUCKET).unwrap().count().unwrap(), 0);
    }
}
