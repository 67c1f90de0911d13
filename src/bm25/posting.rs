//! Posting lists read from the inverted index.
//!
//! A posting row stores one [`MapPair`] per document: the key is the
//! little-endian `u64` document id, the value the little-endian IEEE-754
//! `f64` term frequency.

use std::io::Cursor;

use ahash::AHashSet;
use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{KwrankError, Result};
use crate::storage::MapPair;

/// A single posting: one document's occurrence count for a term, plus the
/// score the scorer assigns it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostingEntry {
    /// Document ID.
    pub doc_id: u64,
    /// Term frequency in the document.
    pub frequency: f64,
    /// BM25 score, zero until scored.
    pub score: f64,
}

impl PostingEntry {
    /// Create an unscored posting.
    pub fn new(doc_id: u64, frequency: f64) -> Self {
        PostingEntry {
            doc_id,
            frequency,
            score: 0.0,
        }
    }

    /// Encode as a map pair in the index row format.
    pub fn to_pair(&self) -> MapPair {
        MapPair::new(self.doc_id.to_le_bytes(), self.frequency.to_le_bytes())
    }
}

/// The postings of one term lookup.
///
/// Entries keep the order in which rows and pairs were read; nothing here
/// sorts them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingList {
    /// Postings in read order.
    pub entries: Vec<PostingEntry>,
    /// Number of postings decoded across all matched rows.
    pub count: u64,
    /// Aggregate checksum of the matched rows.
    pub checksum: Vec<u8>,
}

impl PostingList {
    /// Create a new empty posting list.
    pub fn new() -> Self {
        PostingList::default()
    }

    /// Append the postings decoded from one row.
    pub fn extend_from_row(&mut self, entries: Vec<PostingEntry>) {
        self.count += entries.len() as u64;
        if self.entries.is_empty() {
            self.entries = entries;
        } else {
            self.entries.extend(entries);
        }
    }

    /// Get the length of the posting list.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the posting list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an iterator over the postings.
    pub fn iter(&self) -> std::slice::Iter<'_, PostingEntry> {
        self.entries.iter()
    }

    /// Number of distinct documents in the list.
    pub fn distinct_docs(&self) -> usize {
        let mut seen = AHashSet::with_capacity(self.entries.len());
        self.entries.iter().filter(|e| seen.insert(e.doc_id)).count()
    }

    /// Sort postings by ascending document id. Stable, so duplicates keep
    /// their read order.
    pub fn sort_by_doc_id(&mut self) {
        self.entries.sort_by_key(|e| e.doc_id);
    }

    /// Whether postings are in ascending document id order.
    pub fn is_sorted_by_doc_id(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].doc_id <= w[1].doc_id)
    }

    /// Keep only the first posting of each document id. Returns how many
    /// postings were dropped. `count` is left untouched.
    pub fn remove_duplicates(&mut self) -> usize {
        let before = self.entries.len();
        let mut seen = AHashSet::with_capacity(before);
        self.entries.retain(|e| seen.insert(e.doc_id));
        before - self.entries.len()
    }

    /// Document ids in list order.
    pub fn doc_ids(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.doc_id).collect()
    }
}

/// Decode the pairs of one posting row.
///
/// `row_key` only feeds error messages, so a corrupt pair can be located.
pub fn decode_row(row_key: &[u8], pairs: &[MapPair]) -> Result<Vec<PostingEntry>> {
    pairs
        .iter()
        .enumerate()
        .map(|(i, pair)| decode_pair(pair).map_err(|msg| row_decode_error(row_key, i, msg)))
        .collect()
}

fn decode_pair(pair: &MapPair) -> std::result::Result<PostingEntry, String> {
    if pair.key.len() != 8 {
        return Err(format!("doc id must be 8 bytes, got {}", pair.key.len()));
    }
    if pair.value.len() != 8 {
        return Err(format!("frequency must be 8 bytes, got {}", pair.value.len()));
    }

    let doc_id = Cursor::new(&pair.key)
        .read_u64::<LittleEndian>()
        .map_err(|e| e.to_string())?;
    let frequency = Cursor::new(&pair.value)
        .read_f64::<LittleEndian>()
        .map_err(|e| e.to_string())?;

    Ok(PostingEntry::new(doc_id, frequency))
}

fn row_decode_error(row_key: &[u8], index: usize, msg: String) -> KwrankError {
    KwrankError::decode(
        format!("row '{}' pair {index}", String::from_utf8_lossy(row_key)),
        msg,
    )
}
