//! Folding row hashes into one list-level checksum.
//!
//! A retrieval pass collects one hash per matched index row. The combined
//! checksum is a fingerprint of the pass: identical queries against an
//! unchanged store give identical bytes, and changing any matched row changes
//! its row hash and therefore the result.

use crc32fast::Hasher;

use crate::storage::{MapPair, Operator};

/// Combine the row hashes of one retrieval pass.
///
/// A single hash is returned as is. Otherwise every hash is fed, length
/// prefixed, into a CRC32 whose little-endian value is returned. For
/// [`Operator::Equal`] the hashes are sorted first so the result does not
/// depend on the order rows were read in; every other operator keeps scan
/// order, which the row reader makes reproducible.
pub fn combine_checksums(hashes: &[Vec<u8>], operator: Operator) -> Vec<u8> {
    if hashes.len() == 1 {
        return hashes[0].clone();
    }

    let mut ordered: Vec<&[u8]> = hashes.iter().map(Vec::as_slice).collect();
    if operator.is_order_independent() {
        ordered.sort_unstable();
    }

    let mut hasher = Hasher::new();
    for hash in ordered {
        hasher.update(&(hash.len() as u32).to_le_bytes());
        hasher.update(hash);
    }
    hasher.finalize().to_le_bytes().to_vec()
}

/// Compute the hash of a posting row's pairs, in the form kept in the hash
/// bucket.
pub fn row_hash(pairs: &[MapPair]) -> Vec<u8> {
    let mut hasher = Hasher::new();
    for pair in pairs {
        hasher.update(&pair.key);
        hasher.update(&pair.value);
    }
    hasher.finalize().to_le_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_hash_passes_through() {
        let hashes = vec![vec![1, 2, 3, 4]];
        assert_eq!(combine_checksums(&hashes, Operator::Like), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_equal_is_order_independent() {
        let a = vec![vec![1u8, 1], vec![2u8, 2], vec![3u8]];
        let b = vec![vec![3u8], vec![1u8, 1], vec![2u8, 2]];

        assert_eq!(
            combine_checksums(&a, Operator::Equal),
            combine_checksums(&b, Operator::Equal)
        );
    }

    #[test]
    fn test_range_operators_keep_scan_order() {
        let a = vec![vec![1u8], vec![2u8]];
        let b = vec![vec![2u8], vec![1u8]];

        assert_eq!(
            combine_checksums(&a, Operator::Like),
            combine_checksums(&a, Operator::Like)
        );
        assert_ne!(
            combine_checksums(&a, Operator::Like),
            combine_checksums(&b, Operator::Like)
        );
    }

    #[test]
    fn test_length_prefix_separates_boundaries() {
        let a = vec![vec![1u8, 2], vec![3u8]];
        let b = vec![vec![1u8], vec![2u8, 3]];
        assert_ne!(
            combine_checksums(&a, Operator::GreaterThan),
            combine_checksums(&b, Operator::GreaterThan)
        );
    }

    #[test]
    fn test_row_hash_detects_changed_frequency() {
        let before = vec![MapPair::new(1u64.to_le_bytes(), 1.0f64.to_le_bytes())];
        let after = vec![MapPair::new(1u64.to_le_bytes(), 2.0f64.to_le_bytes())];
        assert_ne!(row_hash(&before), row_hash(&after));
        assert_eq!(row_hash(&before), row_hash(&before));
    }
}
