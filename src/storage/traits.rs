//! Store and bucket abstraction traits.
//!
//! The search core only reads. A [`Store`] hands out named [`Bucket`]s; a
//! bucket holds either plain values (objects, row hashes) or map rows, where
//! each row key owns a list of [`MapPair`]s (posting rows of the inverted
//! index). Implementations must be safe for concurrent readers.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// One entry of a map row: an inner key with its value.
///
/// For posting rows the key is the little-endian document id and the value
/// the little-endian `f64` term frequency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapPair {
    /// Inner key of the pair.
    pub key: Vec<u8>,

    /// Value stored under the inner key.
    pub value: Vec<u8>,
}

impl MapPair {
    /// Create a new map pair.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        MapPair {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Visitor invoked for each map row of a scan.
///
/// Returns `Ok(true)` to continue scanning and `Ok(false)` to stop. An error
/// aborts the scan and is returned by it unchanged.
pub type RowVisitor<'a> = dyn FnMut(&[u8], &[MapPair]) -> Result<bool> + 'a;

/// A named collection of rows inside a [`Store`].
pub trait Bucket: Send + Sync + fmt::Debug {
    /// Name of this bucket.
    fn name(&self) -> &str;

    /// Point read of a plain value by primary key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Point read of a plain value through secondary index `pos`.
    fn get_by_secondary(&self, pos: usize, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All pairs of the map row stored under `key`. A missing row is empty.
    fn map_list(&self, key: &[u8]) -> Result<Vec<MapPair>>;

    /// Visit map rows in ascending key order, starting at `from` (inclusive)
    /// or at the first row when `from` is `None`.
    fn scan_map(&self, from: Option<&[u8]>, visit: &mut RowVisitor<'_>) -> Result<()>;

    /// Number of live plain values in this bucket.
    fn count(&self) -> Result<u64>;
}

/// A key-value store made of named buckets.
pub trait Store: Send + Sync + fmt::Debug {
    /// Look up a bucket by name.
    fn bucket(&self, name: &str) -> Option<Arc<dyn Bucket>>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn bucket(&self, name: &str) -> Option<Arc<dyn Bucket>> {
        self.as_ref().bucket(name)
    }
}
