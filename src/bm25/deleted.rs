//! Logically deleted documents.

use std::fmt;

use ahash::AHashSet;
use parking_lot::RwLock;

/// Reports whether a document id is logically deleted.
///
/// Deleted documents can linger in the inverted index until compaction; the
/// searcher drops them before truncating so they do not take result slots.
pub trait DeletedDocIdChecker: Send + Sync + fmt::Debug {
    fn is_deleted(&self, doc_id: u64) -> bool;
}

/// An in-memory set of deleted document ids.
#[derive(Debug, Default)]
pub struct DeletedDocIds {
    ids: RwLock<AHashSet<u64>>,
}

impl DeletedDocIds {
    /// Create an empty set.
    pub fn new() -> Self {
        DeletedDocIds::default()
    }

    /// Mark `doc_id` as deleted.
    pub fn mark(&self, doc_id: u64) {
        self.ids.write().insert(doc_id);
    }

    /// Number of deleted ids.
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    /// Check if no id is marked.
    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

impl DeletedDocIdChecker for DeletedDocIds {
    fn is_deleted(&self, doc_id: u64) -> bool {
        self.ids.read().contains(&doc_id)
    }
}
