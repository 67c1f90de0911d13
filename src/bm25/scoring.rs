//! BM25 scoring of posting lists.
//!
//! ```text
//! idf   = ln(1 + (N - n + 0.5) / (n + 0.5))
//! tf'   = f / (f + k1 * (1 - b + b * docLen / avgDocLen))
//! score = tf' * idf
//! ```
//!
//! `N` is the number of stored objects and `n` the number of distinct
//! documents in the list. The idf is not clamped, so it can go negative in
//! tiny corpora where a term is in most documents.

use std::fmt;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::bm25::config::Bm25Config;
use crate::bm25::posting::PostingList;
use crate::error::Result;

/// Per-document and corpus-average lengths used for length normalization.
pub trait DocumentLengthProvider: Send + Sync + fmt::Debug {
    /// Length of `doc_id`'s value for `property`.
    fn doc_length(&self, property: &str, doc_id: u64) -> Result<f64>;

    /// Average length of `property` over the corpus.
    fn average_length(&self, property: &str) -> Result<f64>;
}

/// Every document has length 1 and so does the average.
///
/// This disables length normalization. It is the transitional default until
/// the store tracks real lengths.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformDocumentLength;

impl DocumentLengthProvider for UniformDocumentLength {
    fn doc_length(&self, _property: &str, _doc_id: u64) -> Result<f64> {
        Ok(1.0)
    }

    fn average_length(&self, _property: &str) -> Result<f64> {
        Ok(1.0)
    }
}

/// Document lengths held in memory, per property.
///
/// Unknown documents count as average length.
#[derive(Debug, Default)]
pub struct MemoryDocumentLengths {
    lengths: RwLock<AHashMap<String, PropertyLengths>>,
}

#[derive(Debug, Default)]
struct PropertyLengths {
    by_doc: AHashMap<u64, f64>,
    total: f64,
}

impl MemoryDocumentLengths {
    /// Create an empty length table.
    pub fn new() -> Self {
        MemoryDocumentLengths::default()
    }

    /// Record the length of `doc_id` for `property`, replacing any earlier
    /// value.
    pub fn record(&self, property: &str, doc_id: u64, length: f64) {
        let mut lengths = self.lengths.write();
        let entry = lengths.entry(property.to_string()).or_default();
        if let Some(previous) = entry.by_doc.insert(doc_id, length) {
            entry.total -= previous;
        }
        entry.total += length;
    }

    /// Forget `doc_id` for every property.
    pub fn remove(&self, doc_id: u64) {
        for entry in self.lengths.write().values_mut() {
            if let Some(previous) = entry.by_doc.remove(&doc_id) {
                entry.total -= previous;
            }
        }
    }
}

impl DocumentLengthProvider for MemoryDocumentLengths {
    fn doc_length(&self, property: &str, doc_id: u64) -> Result<f64> {
        let lengths = self.lengths.read();
        let Some(entry) = lengths.get(property) else {
            return Ok(1.0);
        };
        match entry.by_doc.get(&doc_id) {
            Some(length) => Ok(*length),
            None if entry.by_doc.is_empty() => Ok(1.0),
            None => Ok(entry.total / entry.by_doc.len() as f64),
        }
    }

    fn average_length(&self, property: &str) -> Result<f64> {
        let lengths = self.lengths.read();
        match lengths.get(property) {
            Some(entry) if !entry.by_doc.is_empty() => {
                Ok(entry.total / entry.by_doc.len() as f64)
            }
            _ => Ok(1.0),
        }
    }
}

/// Inverse document frequency of a term found in `n` of `total_docs`
/// documents.
pub fn idf(total_docs: f64, n: f64) -> f64 {
    (1.0 + (total_docs - n + 0.5) / (n + 0.5)).ln()
}

/// Saturated term frequency.
///
/// A non-positive `avg_doc_len` disables normalization (ratio 1).
pub fn saturated_tf(frequency: f64, k1: f64, b: f64, doc_len: f64, avg_doc_len: f64) -> f64 {
    let ratio = if avg_doc_len > 0.0 {
        doc_len / avg_doc_len
    } else {
        1.0
    };
    let denominator = frequency + k1 * (1.0 - b + b * ratio);
    if denominator == 0.0 {
        return 0.0;
    }
    frequency / denominator
}

/// Scores posting lists in place.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Scorer {
    /// K1 parameter.
    pub k1: f64,
    /// B parameter.
    pub b: f64,
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Bm25Scorer { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Scorer {
    /// Create a scorer from the search configuration.
    pub fn from_config(config: &Bm25Config) -> Self {
        Bm25Scorer {
            k1: config.k1,
            b: config.b,
        }
    }

    /// Assign a BM25 score to every posting of `list`.
    ///
    /// `total_docs` is the number of stored objects; `lengths` supplies the
    /// normalization signal for `property`.
    pub fn score(
        &self,
        list: &mut PostingList,
        property: &str,
        total_docs: u64,
        lengths: &dyn DocumentLengthProvider,
    ) -> Result<()> {
        let n = list.distinct_docs() as f64;
        let term_idf = idf(total_docs as f64, n);
        let avg_doc_len = lengths.average_length(property)?;

        for entry in list.entries.iter_mut() {
            let doc_len = lengths.doc_length(property, entry.doc_id)?;
            let tf = saturated_tf(entry.frequency, self.k1, self.b, doc_len, avg_doc_len);
            entry.score = tf * term_idf;
        }

        Ok(())
    }
}
