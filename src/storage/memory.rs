//! In-memory store implementation for testing and fixtures.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::Result;
use crate::storage::traits::{Bucket, MapPair, RowVisitor, Store};

/// An in-memory, ordered key-value store.
///
/// Buckets are created on demand and shared behind `Arc`, so a bucket handle
/// stays valid after the store drops it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: RwLock<AHashMap<String, Arc<MemoryBucket>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Get the bucket called `name`, creating it if necessary.
    pub fn create_bucket(&self, name: &str) -> Arc<MemoryBucket> {
        if let Some(bucket) = self.buckets.read().get(name) {
            return Arc::clone(bucket);
        }

        let mut buckets = self.buckets.write();
        Arc::clone(
            buckets
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryBucket::new(name))),
        )
    }

    /// Get the concrete bucket called `name`.
    pub fn memory_bucket(&self, name: &str) -> Option<Arc<MemoryBucket>> {
        self.buckets.read().get(name).cloned()
    }

    /// Remove the bucket called `name`. Returns whether it existed.
    pub fn drop_bucket(&self, name: &str) -> bool {
        self.buckets.write().remove(name).is_some()
    }
}

impl Store for MemoryStore {
    fn bucket(&self, name: &str) -> Option<Arc<dyn Bucket>> {
        self.memory_bucket(name)
            .map(|bucket| bucket as Arc<dyn Bucket>)
    }
}

#[derive(Debug, Default)]
struct BucketData {
    /// Plain values by primary key.
    values: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Secondary indexes: position -> secondary key -> primary key.
    secondary: Vec<AHashMap<Vec<u8>, Vec<u8>>>,
    /// Map rows by row key, pairs in insertion order.
    rows: BTreeMap<Vec<u8>, Vec<MapPair>>,
}

/// A bucket of a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryBucket {
    name: String,
    data: RwLock<BucketData>,
}

impl MemoryBucket {
    fn new(name: &str) -> Self {
        MemoryBucket {
            name: name.to_string(),
            data: RwLock::new(BucketData::default()),
        }
    }

    /// Store a plain value.
    pub fn put(&self, key: &[u8], value: Vec<u8>) {
        self.data.write().values.insert(key.to_vec(), value);
    }

    /// Store a plain value reachable through secondary keys, one per index
    /// position.
    ///
    /// Overwriting a key drops the secondary keys it was stored under before.
    pub fn put_with_secondary(&self, key: &[u8], secondary_keys: &[&[u8]], value: Vec<u8>) {
        let mut data = self.data.write();
        if data.values.contains_key(key) {
            for index in data.secondary.iter_mut() {
                index.retain(|_, primary| primary.as_slice() != key);
            }
        }
        if data.secondary.len() < secondary_keys.len() {
            data.secondary.resize_with(secondary_keys.len(), AHashMap::new);
        }
        for (pos, secondary) in secondary_keys.iter().enumerate() {
            data.secondary[pos].insert(secondary.to_vec(), key.to_vec());
        }
        data.values.insert(key.to_vec(), value);
    }

    /// Delete a plain value and its secondary entries. Returns whether it
    /// existed.
    pub fn delete(&self, key: &[u8]) -> bool {
        let mut data = self.data.write();
        for index in data.secondary.iter_mut() {
            index.retain(|_, primary| primary.as_slice() != key);
        }
        data.values.remove(key).is_some()
    }

    /// Append pairs to the map row `row_key`.
    ///
    /// A pair whose inner key already exists in the row replaces the old
    /// value in place; new inner keys go to the end of the row.
    pub fn append_map(&self, row_key: &[u8], pairs: Vec<MapPair>) {
        let mut data = self.data.write();
        let row = data.rows.entry(row_key.to_vec()).or_default();
        for pair in pairs {
            match row.iter_mut().find(|existing| existing.key == pair.key) {
                Some(existing) => existing.value = pair.value,
                None => row.push(pair),
            }
        }
    }

    /// Replace the map row `row_key` verbatim, duplicates included.
    pub fn put_map_raw(&self, row_key: &[u8], pairs: Vec<MapPair>) {
        self.data.write().rows.insert(row_key.to_vec(), pairs);
    }

    /// Remove the pair with inner key `pair_key` from row `row_key`.
    pub fn remove_map_pair(&self, row_key: &[u8], pair_key: &[u8]) -> bool {
        let mut data = self.data.write();
        let Some(row) = data.rows.get_mut(row_key) else {
            return false;
        };
        let before = row.len();
        row.retain(|pair| pair.key != pair_key);
        let removed = row.len() != before;
        if row.is_empty() {
            data.rows.remove(row_key);
        }
        removed
    }
}

impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().values.get(key).cloned())
    }

    fn get_by_secondary(&self, pos: usize, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let data = self.data.read();
        let value = data
            .secondary
            .get(pos)
            .and_then(|index| index.get(key))
            .and_then(|primary| data.values.get(primary))
            .cloned();
        Ok(value)
    }

    fn map_list(&self, key: &[u8]) -> Result<Vec<MapPair>> {
        Ok(self.data.read().rows.get(key).cloned().unwrap_or_default())
    }

    fn scan_map(&self, from: Option<&[u8]>, visit: &mut RowVisitor<'_>) -> Result<()> {
        // Visitors must not write to this bucket while the read guard is held.
        let data = self.data.read();
        let lower = match from {
            Some(start) => Bound::Included(start),
            None => Bound::Unbounded,
        };

        for (key, pairs) in data
            .rows
            .range::<[u8], _>((lower, Bound::Unbounded))
        {
            if !visit(key, pairs)? {
                break;
            }
        }

        Ok(())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.data.read().values.len() as u64)
    }
}
