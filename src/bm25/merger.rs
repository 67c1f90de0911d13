//! Merging per-term scored postings into one ranked set.

use ahash::{AHashMap, AHashSet};

use crate::bm25::posting::PostingList;

/// A document with its aggregated score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    /// Document ID.
    pub doc_id: u64,
    /// Sum of the per-term scores.
    pub score: f64,
}

/// Distinct documents with one aggregated score each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedResultSet {
    docs: Vec<ScoredDoc>,
}

impl MergedResultSet {
    /// Number of documents in the set.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Documents in their current order.
    pub fn docs(&self) -> &[ScoredDoc] {
        &self.docs
    }

    /// Document ids in their current order.
    pub fn doc_ids(&self) -> Vec<u64> {
        self.docs.iter().map(|d| d.doc_id).collect()
    }

    /// Keep only the documents matching `keep`.
    pub fn retain<F: FnMut(&ScoredDoc) -> bool>(&mut self, keep: F) {
        self.docs.retain(keep);
    }

    /// Order by descending score, breaking ties by ascending document id.
    pub fn sort_by_score(&mut self) {
        self.docs.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
    }

    /// Keep at most `limit` documents.
    pub fn truncate(&mut self, limit: usize) {
        self.docs.truncate(limit);
    }

    /// Consume the set.
    pub fn into_docs(self) -> Vec<ScoredDoc> {
        self.docs
    }
}

/// Combines the scored posting lists of a query's terms with OR semantics.
///
/// A document appears once if any term matched it; its score is the sum of
/// one contribution per matching term. Repeated postings of a document inside
/// one list count once, the first one read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreMerger;

impl ScoreMerger {
    /// Create a new score merger.
    pub fn new() -> Self {
        ScoreMerger
    }

    /// Merge the lists. The result is in ascending document id order.
    pub fn merge(&self, lists: &[PostingList]) -> MergedResultSet {
        let capacity = lists.iter().map(PostingList::len).max().unwrap_or(0);
        let mut scores: AHashMap<u64, f64> = AHashMap::with_capacity(capacity);

        for list in lists {
            let mut seen = AHashSet::with_capacity(list.len());
            for entry in list.iter() {
                if !seen.insert(entry.doc_id) {
                    continue;
                }
                *scores.entry(entry.doc_id).or_insert(0.0) += entry.score;
            }
        }

        let mut docs: Vec<ScoredDoc> = scores
            .into_iter()
            .map(|(doc_id, score)| ScoredDoc { doc_id, score })
            .collect();
        docs.sort_unstable_by(|a, b| a.doc_id.cmp(&b.doc_id));

        MergedResultSet { docs }
    }
}
